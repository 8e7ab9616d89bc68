//! YouTube search result cache
//!
//! Rows older than the TTL are treated as misses and removed by
//! [`purge_expired`].

use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use tubering_common::Result;

use super::parse_timestamp_column;

/// Default cache lifetime (6 hours)
pub const DEFAULT_TTL_SECS: u64 = 6 * 60 * 60;

/// Normalized cache key: lowercase, collapsed whitespace
pub fn cache_key(query: &str, max_results: u32) -> String {
    let normalized = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    format!("{}#{}", normalized, max_results)
}

/// Cached value if present and younger than `ttl_secs`
pub async fn get_cached<T: DeserializeOwned>(
    pool: &SqlitePool,
    key: &str,
    ttl_secs: u64,
) -> Result<Option<T>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT results, cached_at FROM search_cache WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    let Some((results, cached_at)) = row else {
        return Ok(None);
    };

    let cached_at = parse_timestamp_column("cached_at", &cached_at)?;
    if Utc::now() - cached_at > Duration::seconds(ttl_secs as i64) {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(&results)?))
}

/// Store (or refresh) a cached value
pub async fn put_cached<T: Serialize>(pool: &SqlitePool, key: &str, value: &T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO search_cache (cache_key, results, cached_at) VALUES (?, ?, ?)
        ON CONFLICT(cache_key) DO UPDATE SET results = excluded.results, cached_at = excluded.cached_at
        "#,
    )
    .bind(key)
    .bind(serde_json::to_string(value)?)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete entries older than `ttl_secs`; returns rows removed
pub async fn purge_expired(pool: &SqlitePool, ttl_secs: u64) -> Result<u64> {
    let cutoff = (Utc::now() - Duration::seconds(ttl_secs as i64)).to_rfc3339();
    let result = sqlx::query("DELETE FROM search_cache WHERE cached_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(cache_key("  광합성   실험 ", 10), "광합성 실험#10");
        assert_eq!(cache_key("Solar System", 5), cache_key("solar  system", 5));
        assert_ne!(cache_key("a", 5), cache_key("a", 10));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let pool = setup_test_db().await;
        let key = cache_key("q", 5);

        put_cached(&pool, &key, &vec!["v1".to_string()]).await.unwrap();

        let hit: Option<Vec<String>> = get_cached(&pool, &key, 60).await.unwrap();
        assert_eq!(hit, Some(vec!["v1".to_string()]));
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_purged() {
        let pool = setup_test_db().await;
        let stale = (Utc::now() - Duration::hours(2)).to_rfc3339();
        sqlx::query("INSERT INTO search_cache (cache_key, results, cached_at) VALUES ('old', '[]', ?)")
            .bind(stale)
            .execute(&pool)
            .await
            .unwrap();
        put_cached(&pool, "fresh", &Vec::<String>::new()).await.unwrap();

        let hit: Option<Vec<String>> = get_cached(&pool, "old", 3600).await.unwrap();
        assert!(hit.is_none());

        assert_eq!(purge_expired(&pool, 3600).await.unwrap(), 1);
        let fresh: Option<Vec<String>> = get_cached(&pool, "fresh", 3600).await.unwrap();
        assert!(fresh.is_some());
    }
}
