//! Shared test doubles and app setup for tubering-api integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use http_body_util::BodyExt;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tubering_api::services::{
    GeminiError, GenerationRequest, GenerativeModel, SearchHit, VideoCatalog, VideoDetails,
    YouTubeError,
};
use tubering_api::{build_router, AppState};
use tubering_common::events::EventBus;

type Responder = dyn Fn(&GenerationRequest) -> Result<String, GeminiError> + Send + Sync;

/// In-process `GenerativeModel` answering from a closure and recording calls
pub struct ScriptedModel {
    responder: Box<Responder>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GeminiError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Model that always answers with the same text
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<String, GeminiError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

/// Window start of a chunk request (`None` for whole-video or text prompts)
pub fn window_start(request: &GenerationRequest) -> Option<u32> {
    request.video.as_ref().and_then(|v| v.start_seconds)
}

/// In-memory `VideoCatalog`
#[derive(Default)]
pub struct FakeCatalog {
    pub videos: Vec<VideoDetails>,
    /// Search results keyed by exact query
    pub results: HashMap<String, Vec<SearchHit>>,
    /// Every search fails with this status when set
    pub search_failure: Option<u16>,
    pub searches: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with_video(mut self, video: VideoDetails) -> Self {
        self.videos.push(video);
        self
    }

    pub fn with_results(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_string(), hits);
        self
    }
}

#[async_trait]
impl VideoCatalog for FakeCatalog {
    async fn search(&self, query: &str, _max_results: u32) -> Result<Vec<SearchHit>, YouTubeError> {
        self.searches.lock().unwrap().push(query.to_string());
        if let Some(status) = self.search_failure {
            return Err(YouTubeError::Api(status, "scripted failure".to_string()));
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }

    async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoDetails>, YouTubeError> {
        Ok(self
            .videos
            .iter()
            .filter(|v| ids.contains(&v.video_id))
            .cloned()
            .collect())
    }
}

pub fn video(id: &str, title: &str, duration_seconds: u32, view_count: u64) -> VideoDetails {
    VideoDetails {
        video_id: id.to_string(),
        title: title.to_string(),
        channel_title: "교육채널".to_string(),
        description: String::new(),
        thumbnail_url: None,
        duration_seconds,
        view_count,
        published_at: None,
    }
}

pub fn hit(id: &str, title: &str) -> SearchHit {
    SearchHit {
        video_id: id.to_string(),
        title: title.to_string(),
        channel_title: "교육채널".to_string(),
        thumbnail_url: None,
        published_at: None,
    }
}

/// In-memory database with the full schema
pub async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    tubering_common::db::create_all_tables(&pool).await.unwrap();
    pool
}

/// Router and state over an in-memory database
pub async fn create_test_app(
    model: Arc<dyn GenerativeModel>,
    catalog: Arc<dyn VideoCatalog>,
) -> (Router, AppState) {
    let pool = setup_db().await;
    let state = AppState::new(pool, EventBus::new(100), model, catalog);
    (build_router(state.clone()), state)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
