//! Gemini API client
//!
//! Calls `v1beta/models/{model}:generateContent` asking for a JSON
//! response. Video requests pass the YouTube URL as `fileData` with optional
//! start/end offsets, so each analysis window is its own request.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const REQUEST_TIMEOUT_SECS: u64 = 180;

/// Gemini client errors
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini API key not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Empty response from model")]
    EmptyOutput,

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Video segment attached to a request
#[derive(Debug, Clone, PartialEq)]
pub struct VideoClip {
    pub url: String,
    pub start_seconds: Option<u32>,
    pub end_seconds: Option<u32>,
}

impl VideoClip {
    /// Whole video
    pub fn whole(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start_seconds: None,
            end_seconds: None,
        }
    }

    /// `[start, end)` window of the video
    pub fn window(url: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            url: url.into(),
            start_seconds: Some(start),
            end_seconds: Some(end),
        }
    }
}

/// One prompt, optionally about a video
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub video: Option<VideoClip>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            video: None,
        }
    }

    pub fn with_video(prompt: impl Into<String>, video: VideoClip) -> Self {
        Self {
            prompt: prompt.into(),
            video: Some(video),
        }
    }
}

/// A model that answers prompts with JSON text
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Raw response text (expected to contain JSON)
    async fn generate_json(&self, request: &GenerationRequest) -> Result<String, GeminiError>;
}

/// Shared, runtime-replaceable API key
pub type ApiKeySlot = Arc<RwLock<Option<String>>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_offset: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReqPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_metadata: Option<VideoMetadata>,
}

#[derive(Debug, Serialize)]
struct ReqContent {
    parts: Vec<ReqPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<ReqContent>,
    generation_config: GenerationConfig,
}

impl GeminiRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        let mut parts = Vec::with_capacity(2);

        if let Some(video) = &request.video {
            let metadata = match (video.start_seconds, video.end_seconds) {
                (None, None) => None,
                (start, end) => Some(VideoMetadata {
                    start_offset: start.map(|s| format!("{}s", s)),
                    end_offset: end.map(|s| format!("{}s", s)),
                }),
            };
            parts.push(ReqPart {
                text: None,
                file_data: Some(FileData {
                    file_uri: video.url.clone(),
                }),
                video_metadata: metadata,
            });
        }

        parts.push(ReqPart {
            text: Some(request.prompt.clone()),
            file_data: None,
            video_metadata: None,
        });

        Self {
            contents: vec![ReqContent { parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.2,
            },
        }
    }
}

/// Gemini REST client
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: ApiKeySlot,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: ApiKeySlot, model: Option<String>) -> Result<Self, GeminiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeminiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point at a different endpoint (proxy or local stub)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<String, GeminiError> {
        let key = self
            .api_key
            .read()
            .await
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GeminiError::NotConfigured)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        tracing::debug!(
            model = %self.model,
            has_video = request.video.is_some(),
            prompt_chars = request.prompt.chars().count(),
            "Calling Gemini"
        );

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(&GeminiRequest::from_request(request))
            .send()
            .await
            .map_err(|e| GeminiError::Network(e.to_string()))?;

        let status = response.status();

        if status == 429 {
            return Err(GeminiError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api(status.as_u16(), error_text));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GeminiError::Parse(e.to_string()))?;

        extract_text(&body).ok_or(GeminiError::EmptyOutput)
    }
}

/// Concatenate `candidates[0].content.parts[*].text`
fn extract_text(body: &serde_json::Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    text.chars().any(|c| !c.is_whitespace()).then_some(text)
}
