//! YouTube Data API v3 client
//!
//! Every request goes through [`with_key_rotation`] so a quota-exhausted key
//! (HTTP 403) hands over to the next configured key. Search results are
//! cached in SQLite keyed by the normalized query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use super::key_rotation::{with_key_rotation, KeyIndexStore, KeyRing, RotatableError, RotationError};
use crate::db::search_cache;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// `videos.list` accepts at most 50 ids per call
const MAX_IDS_PER_REQUEST: usize = 50;

/// YouTube client errors
#[derive(Debug, Error)]
pub enum YouTubeError {
    #[error("Network error: {0}")]
    Network(String),

    /// 403: quota exceeded or key rejected; triggers key rotation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Rotation(#[from] RotationError),
}

impl RotatableError for YouTubeError {
    fn is_key_rejected(&self) -> bool {
        matches!(self, YouTubeError::Forbidden(_))
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<String>,
}

/// Video metadata from `videos.list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: u32,
    pub view_count: u64,
    pub published_at: Option<String>,
}

// Wire types

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    description: String,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(&self) -> Option<String> {
        self.high
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.default.as_ref())
            .map(|t| t.url.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

/// Read access to YouTube video metadata
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Search videos by free-text query
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>, YouTubeError>;

    /// Details for any number of ids; unknown ids are omitted
    async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoDetails>, YouTubeError>;

    /// Details for one video
    async fn video(&self, video_id: &str) -> Result<VideoDetails, YouTubeError> {
        self.video_details(&[video_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| YouTubeError::NotFound(video_id.to_string()))
    }
}

/// Search cache settings
#[derive(Clone)]
pub struct SearchCache {
    pub pool: SqlitePool,
    pub ttl_secs: u64,
}

/// YouTube Data API client
pub struct YouTubeClient {
    http_client: reqwest::Client,
    keys: Arc<RwLock<Vec<String>>>,
    key_index: Arc<dyn KeyIndexStore>,
    cache: Option<SearchCache>,
    base_url: String,
}

impl YouTubeClient {
    /// `keys` is shared with the settings endpoint so key changes apply live
    pub fn new(
        keys: Arc<RwLock<Vec<String>>>,
        key_index: Arc<dyn KeyIndexStore>,
    ) -> Result<Self, YouTubeError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| YouTubeError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            keys,
            key_index,
            cache: None,
            base_url: YOUTUBE_API_BASE.to_string(),
        })
    }

    pub fn with_cache(mut self, cache: SearchCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn key_ring(&self) -> KeyRing {
        KeyRing::new(self.keys.read().await.clone(), self.key_index.clone())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        key: &str,
    ) -> Result<T, YouTubeError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| YouTubeError::Network(e.to_string()))?;

        let status = response.status();

        if status == 403 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(YouTubeError::Forbidden(error_text));
        }

        if status == 404 {
            return Err(YouTubeError::NotFound(endpoint.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(YouTubeError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| YouTubeError::Parse(e.to_string()))
    }
}

#[async_trait]
impl VideoCatalog for YouTubeClient {
    /// Safe-search strict, Korean relevance
    async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchHit>, YouTubeError> {
        let cache_key = search_cache::cache_key(query, max_results);

        if let Some(cache) = &self.cache {
            match search_cache::get_cached::<Vec<SearchHit>>(&cache.pool, &cache_key, cache.ttl_secs)
                .await
            {
                Ok(Some(hits)) => {
                    tracing::debug!(query = %query, hits = hits.len(), "Search cache hit");
                    return Ok(hits);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Search cache read failed"),
            }
        }

        let ring = self.key_ring().await;
        let max = max_results.to_string();
        let response: ListResponse<SearchItem> = with_key_rotation(&ring, |key| {
            let params = [
                ("part", "snippet"),
                ("type", "video"),
                ("safeSearch", "strict"),
                ("relevanceLanguage", "ko"),
                ("q", query),
                ("maxResults", max.as_str()),
            ];
            let params: Vec<(String, String)> = params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            async move { self.get_json("search", &params, &key).await }
        })
        .await?;

        let hits: Vec<SearchHit> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(SearchHit {
                    video_id,
                    title: decode_html_entities(&item.snippet.title),
                    channel_title: decode_html_entities(&item.snippet.channel_title),
                    thumbnail_url: item.snippet.thumbnails.best(),
                    published_at: item.snippet.published_at,
                })
            })
            .collect();

        tracing::debug!(query = %query, hits = hits.len(), "YouTube search complete");

        if let Some(cache) = &self.cache {
            if let Err(e) = search_cache::put_cached(&cache.pool, &cache_key, &hits).await {
                tracing::warn!(error = %e, "Search cache write failed");
            }
        }

        Ok(hits)
    }

    /// Batched by 50 ids per call
    async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoDetails>, YouTubeError> {
        let ring = self.key_ring().await;
        let mut details = Vec::with_capacity(ids.len());

        for batch in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = batch.join(",");
            let response: ListResponse<VideoItem> = with_key_rotation(&ring, |key| {
                let params = vec![
                    ("part".to_string(), "snippet,contentDetails,statistics".to_string()),
                    ("id".to_string(), joined.clone()),
                ];
                async move { self.get_json("videos", &params, &key).await }
            })
            .await?;

            details.extend(response.items.into_iter().map(video_details_from_item));
        }

        Ok(details)
    }
}

fn video_details_from_item(item: VideoItem) -> VideoDetails {
    let duration_seconds = item
        .content_details
        .and_then(|c| c.duration)
        .and_then(|d| parse_iso8601_duration(&d))
        .unwrap_or(0);
    let view_count = item
        .statistics
        .and_then(|s| s.view_count)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    VideoDetails {
        video_id: item.id,
        title: decode_html_entities(&item.snippet.title),
        channel_title: decode_html_entities(&item.snippet.channel_title),
        description: item.snippet.description,
        thumbnail_url: item.snippet.thumbnails.best(),
        duration_seconds,
        view_count,
        published_at: item.snippet.published_at,
    }
}

/// Parse an ISO-8601 duration (`PT1H2M3S`, `P1DT2H`, `PT45S`) into seconds
///
/// Year/month/week designators are rejected; YouTube never emits them.
pub fn parse_iso8601_duration(input: &str) -> Option<u32> {
    let rest = input.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total: u32 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            'D' | 'H' | 'M' | 'S' => {
                let value: u32 = digits.parse().ok()?;
                digits.clear();
                let unit = match (c, in_time) {
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = total.checked_add(value.checked_mul(unit)?)?;
                saw_component = true;
            }
            _ => return None,
        }
    }

    (digits.is_empty() && saw_component).then_some(total)
}

/// Decode the HTML entities YouTube puts in snippet titles
///
/// Handles decimal and hex numeric references plus the named entities
/// `quot`, `apos`, `amp`, `lt`, `gt` and `nbsp`. Anything else is kept as-is.
fn decode_html_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }

    match name {
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}
