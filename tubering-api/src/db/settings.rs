//! Settings database operations
//!
//! Provides get/set accessors for the settings table following the
//! key-value pattern. API keys configured through the web UI land here and
//! take priority over environment variables and the TOML file.

use sqlx::{Pool, Sqlite};
use tubering_common::{Error, Result};

pub const GEMINI_API_KEY: &str = "gemini_api_key";
pub const YOUTUBE_API_KEYS: &str = "youtube_api_keys";
pub const YOUTUBE_API_KEY_INDEX: &str = "youtube_api_key_index";

/// Get Gemini API key from database
pub async fn get_gemini_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, GEMINI_API_KEY).await
}

/// Set Gemini API key in database
pub async fn set_gemini_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, GEMINI_API_KEY, key).await
}

/// Get YouTube API key list (stored as a JSON array)
pub async fn get_youtube_api_keys(db: &Pool<Sqlite>) -> Result<Option<Vec<String>>> {
    match get_setting::<String>(db, YOUTUBE_API_KEYS).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Replace the YouTube API key list
pub async fn set_youtube_api_keys(db: &Pool<Sqlite>, keys: &[String]) -> Result<()> {
    let raw = serde_json::to_string(keys)?;
    set_setting(db, YOUTUBE_API_KEYS, raw).await
}

/// Get the persisted key rotation index (0 when never rotated)
pub async fn get_youtube_key_index(db: &Pool<Sqlite>) -> Result<usize> {
    get_setting(db, YOUTUBE_API_KEY_INDEX)
        .await
        .map(|opt| opt.unwrap_or(0))
}

/// Persist the key rotation index
pub async fn set_youtube_key_index(db: &Pool<Sqlite>, index: usize) -> Result<()> {
    set_setting(db, YOUTUBE_API_KEY_INDEX, index).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    #[tokio::test]
    async fn test_gemini_key_absent_then_set() {
        let pool = setup_test_db().await;

        assert_eq!(get_gemini_api_key(&pool).await.unwrap(), None);

        set_gemini_api_key(&pool, "gem-123".to_string()).await.unwrap();
        assert_eq!(
            get_gemini_api_key(&pool).await.unwrap(),
            Some("gem-123".to_string())
        );
    }

    #[tokio::test]
    async fn test_set_is_upsert() {
        let pool = setup_test_db().await;

        set_gemini_api_key(&pool, "old".to_string()).await.unwrap();
        set_gemini_api_key(&pool, "new".to_string()).await.unwrap();

        assert_eq!(get_gemini_api_key(&pool).await.unwrap(), Some("new".to_string()));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = ?")
            .bind(GEMINI_API_KEY)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_youtube_keys_stored_as_list() {
        let pool = setup_test_db().await;
        let keys = vec!["k1".to_string(), "k2".to_string(), "k3".to_string()];

        set_youtube_api_keys(&pool, &keys).await.unwrap();

        assert_eq!(get_youtube_api_keys(&pool).await.unwrap(), Some(keys));
    }

    #[tokio::test]
    async fn test_key_index_defaults_to_zero() {
        let pool = setup_test_db().await;

        assert_eq!(get_youtube_key_index(&pool).await.unwrap(), 0);
        set_youtube_key_index(&pool, 2).await.unwrap();
        assert_eq!(get_youtube_key_index(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_value_is_config_error() {
        let pool = setup_test_db().await;
        set_setting(&pool, YOUTUBE_API_KEY_INDEX, "not-a-number").await.unwrap();

        let err = get_youtube_key_index(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
