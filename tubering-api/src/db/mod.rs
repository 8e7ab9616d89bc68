//! Database access for tubering-api
//!
//! One module per stored record type. All timestamps are stored as RFC 3339
//! text; list-valued columns hold JSON arrays.

pub mod analysis_requests;
pub mod daily_usage;
pub mod documents;
pub mod jjim;
pub mod like_subjects;
pub mod recommend_keywords;
pub mod recommendation_requests;
pub mod search_cache;
pub mod settings;
pub mod shared_videos;
pub mod users;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the file and every table on first run.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    let pool = tubering_common::db::init_database(db_path).await?;
    Ok(pool)
}

/// Parse a stored RFC 3339 timestamp
pub(crate) fn parse_timestamp_column(
    column: &str,
    value: &str,
) -> tubering_common::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            tubering_common::Error::Internal(format!("Failed to parse {}: {}", column, e))
        })
}

/// Decode a JSON string-array column
pub(crate) fn parse_string_list(value: &str) -> tubering_common::Result<Vec<String>> {
    Ok(serde_json::from_str(value)?)
}
