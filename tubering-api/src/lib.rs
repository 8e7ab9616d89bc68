//! tubering-api library interface
//!
//! Exposes the router and state so integration tests can drive the service
//! without binding a socket.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tubering_common::events::EventBus;

use crate::db::jjim::JjimStore;
use crate::services::{ApiKeySlot, GenerativeModel, ServiceContext, VideoCatalog};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Gemini key shared with the client; the settings endpoint swaps it live
    pub gemini_key: ApiKeySlot,
    /// YouTube key list shared with the client
    pub youtube_keys: Arc<RwLock<Vec<String>>>,
    pub model: Arc<dyn GenerativeModel>,
    pub catalog: Arc<dyn VideoCatalog>,
    pub jjim: JjimStore,
    /// TOML file that settings are mirrored into (none disables the mirror)
    pub toml_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        model: Arc<dyn GenerativeModel>,
        catalog: Arc<dyn VideoCatalog>,
    ) -> Self {
        Self {
            jjim: JjimStore::new(db.clone()),
            db,
            event_bus,
            gemini_key: Arc::new(RwLock::new(None)),
            youtube_keys: Arc::new(RwLock::new(Vec::new())),
            model,
            catalog,
            toml_path: None,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Share key slots with the clients built in `main`
    pub fn with_key_slots(
        mut self,
        gemini_key: ApiKeySlot,
        youtube_keys: Arc<RwLock<Vec<String>>>,
    ) -> Self {
        self.gemini_key = gemini_key;
        self.youtube_keys = youtube_keys;
        self
    }

    pub fn with_toml_path(mut self, toml_path: Option<PathBuf>) -> Self {
        self.toml_path = toml_path;
        self
    }

    pub fn with_jjim_store(mut self, jjim: JjimStore) -> Self {
        self.jjim = jjim;
        self
    }

    /// Collaborators handed to background tasks
    pub fn service_context(&self) -> ServiceContext {
        ServiceContext {
            db: self.db.clone(),
            event_bus: self.event_bus.clone(),
            model: self.model.clone(),
            catalog: self.catalog.clone(),
        }
    }

    /// Remember a background failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/events", get(api::event_stream))
        .merge(api::analysis_routes())
        .merge(api::recommendation_routes())
        .merge(api::usage_routes())
        .merge(api::user_routes())
        .merge(api::jjim_routes())
        .merge(api::board_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
}
