//! Settings endpoints and API key resolution

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use tower::ServiceExt;
use tubering_api::config::{
    resolve_gemini_api_key, resolve_youtube_api_keys, GEMINI_API_KEY_ENV, YOUTUBE_API_KEYS_ENV,
};
use tubering_api::db::settings;
use tubering_common::config::{load_toml_config, TomlConfig};

async fn app_with_toml(
    toml_path: std::path::PathBuf,
) -> (axum::Router, tubering_api::AppState) {
    let state = tubering_api::AppState::new(
        setup_db().await,
        tubering_common::events::EventBus::new(16),
        Arc::new(ScriptedModel::constant("{}")),
        Arc::new(FakeCatalog::default()),
    )
    .with_toml_path(Some(toml_path));
    (tubering_api::build_router(state.clone()), state)
}

#[tokio::test]
async fn test_set_gemini_key_updates_db_slot_and_toml() {
    let dir = tempfile::tempdir().unwrap();
    let toml_path = dir.path().join("config.toml");
    let (app, state) = app_with_toml(toml_path.clone()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/settings/gemini_api_key",
            json!({"api_key": "  gemini-key-123  "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    assert_eq!(
        settings::get_gemini_api_key(&state.db).await.unwrap().as_deref(),
        Some("gemini-key-123")
    );
    assert_eq!(state.gemini_key.read().await.as_deref(), Some("gemini-key-123"));
    assert_eq!(
        load_toml_config(&toml_path).unwrap().gemini_api_key.as_deref(),
        Some("gemini-key-123")
    );
}

#[tokio::test]
async fn test_blank_gemini_key_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = app_with_toml(dir.path().join("config.toml")).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/settings/gemini_api_key",
            json!({"api_key": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(settings::get_gemini_api_key(&state.db).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_youtube_keys_resets_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = app_with_toml(dir.path().join("config.toml")).await;
    settings::set_youtube_key_index(&state.db, 2).await.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/settings/youtube_api_keys",
            json!({"api_keys": "key-a, key-b,,key-c"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        settings::get_youtube_api_keys(&state.db).await.unwrap(),
        Some(vec!["key-a".to_string(), "key-b".to_string(), "key-c".to_string()])
    );
    assert_eq!(settings::get_youtube_key_index(&state.db).await.unwrap(), 0);
    assert_eq!(state.youtube_keys.read().await.len(), 3);

    let response = app
        .oneshot(empty_request("GET", "/api/settings"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["youtube_api_keys"][0], "*ey-a");
    assert!(body["gemini_api_key"].is_null());
}

#[tokio::test]
async fn test_empty_youtube_key_list_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = app_with_toml(dir.path().join("config.toml")).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/settings/youtube_api_keys",
            json!({"api_keys": ["", " "]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_gemini_key_priority_database_env_toml() {
    let pool = setup_db().await;
    let toml = TomlConfig {
        gemini_api_key: Some("toml-key".to_string()),
        ..Default::default()
    };

    std::env::remove_var(GEMINI_API_KEY_ENV);
    assert_eq!(resolve_gemini_api_key(&pool, &toml).await.unwrap(), "toml-key");

    std::env::set_var(GEMINI_API_KEY_ENV, "env-key");
    assert_eq!(resolve_gemini_api_key(&pool, &toml).await.unwrap(), "env-key");

    settings::set_gemini_api_key(&pool, "db-key".to_string())
        .await
        .unwrap();
    assert_eq!(resolve_gemini_api_key(&pool, &toml).await.unwrap(), "db-key");

    std::env::remove_var(GEMINI_API_KEY_ENV);
}

#[tokio::test]
#[serial]
async fn test_missing_gemini_key_is_config_error() {
    let pool = setup_db().await;
    std::env::remove_var(GEMINI_API_KEY_ENV);

    let err = resolve_gemini_api_key(&pool, &TomlConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, tubering_common::Error::Config(_)));
}

#[tokio::test]
#[serial]
async fn test_youtube_keys_from_env_list() {
    let pool = setup_db().await;
    let toml = TomlConfig {
        youtube_api_keys: vec!["toml-1".to_string()],
        ..Default::default()
    };

    std::env::set_var(YOUTUBE_API_KEYS_ENV, "env-1, env-2");
    assert_eq!(
        resolve_youtube_api_keys(&pool, &toml).await.unwrap(),
        vec!["env-1", "env-2"]
    );

    std::env::set_var(YOUTUBE_API_KEYS_ENV, " , ");
    assert_eq!(
        resolve_youtube_api_keys(&pool, &toml).await.unwrap(),
        vec!["toml-1"]
    );

    std::env::remove_var(YOUTUBE_API_KEYS_ENV);
}
