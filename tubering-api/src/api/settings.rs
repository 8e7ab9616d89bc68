//! Settings API endpoints
//!
//! Keys are written to the database (authoritative), swapped into the live
//! client slots, and mirrored into the TOML file on a best-effort basis.

use crate::config::{is_valid_key, mask_key, parse_key_list, sync_settings_to_toml, TomlSetting};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Request payload for setting the Gemini API key
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

/// Request payload for replacing the YouTube key list
///
/// `api_keys` may be an array or one comma-separated string.
#[derive(Debug, Deserialize)]
pub struct SetApiKeysRequest {
    pub api_keys: KeyList,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KeyList {
    List(Vec<String>),
    Joined(String),
}

impl KeyList {
    fn into_keys(self) -> Vec<String> {
        match self {
            KeyList::List(keys) => keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            KeyList::Joined(raw) => parse_key_list(&raw),
        }
    }
}

/// Response payload for key configuration
#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// Current key configuration, masked
#[derive(Debug, Serialize)]
pub struct SettingsStatus {
    pub gemini_api_key: Option<String>,
    pub youtube_api_keys: Vec<String>,
    pub youtube_key_index: usize,
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsStatus>> {
    let gemini_api_key = state.gemini_key.read().await.as_deref().map(mask_key);
    let youtube_api_keys = state
        .youtube_keys
        .read()
        .await
        .iter()
        .map(|k| mask_key(k))
        .collect();
    let youtube_key_index = crate::db::settings::get_youtube_key_index(&state.db).await?;

    Ok(Json(SettingsStatus {
        gemini_api_key,
        youtube_api_keys,
        youtube_key_index,
    }))
}

/// POST /api/settings/gemini_api_key
///
/// **Request:** `{"api_key": "..."}`
///
/// 400 for a blank key; TOML write failures only log a warning.
pub async fn set_gemini_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if !is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }
    let key = payload.api_key.trim().to_string();

    crate::db::settings::set_gemini_api_key(&state.db, key.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API key to database: {}", e)))?;

    *state.gemini_key.write().await = Some(key.clone());
    info!("Gemini API key configured via settings endpoint");

    mirror_to_toml(&state, TomlSetting::GeminiApiKey(key)).await;

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "Gemini API key configured successfully".to_string(),
    }))
}

/// POST /api/settings/youtube_api_keys
///
/// **Request:** `{"api_keys": ["k1", "k2"]}` or `{"api_keys": "k1,k2"}`
///
/// Replacing the list restarts rotation at the first key.
pub async fn set_youtube_api_keys(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeysRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    let keys = payload.api_keys.into_keys();
    if keys.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one non-blank API key is required".to_string(),
        ));
    }

    crate::db::settings::set_youtube_api_keys(&state.db, &keys)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API keys to database: {}", e)))?;
    crate::db::settings::set_youtube_key_index(&state.db, 0).await?;

    *state.youtube_keys.write().await = keys.clone();
    info!(count = keys.len(), "YouTube API keys configured via settings endpoint");

    let count = keys.len();
    mirror_to_toml(&state, TomlSetting::YouTubeApiKeys(keys)).await;

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: format!("{} YouTube API key(s) configured successfully", count),
    }))
}

async fn mirror_to_toml(state: &AppState, setting: TomlSetting) {
    let Some(toml_path) = &state.toml_path else {
        return;
    };
    if let Err(e) = sync_settings_to_toml(vec![setting], toml_path).await {
        warn!("TOML sync failed (database write succeeded): {}", e);
    }
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(get_settings))
        .route("/api/settings/gemini_api_key", post(set_gemini_api_key))
        .route("/api/settings/youtube_api_keys", post(set_youtube_api_keys))
}
