//! Database initialization
//!
//! Creates the SQLite database on first run and every table the service
//! uses. All `create_*_table` functions are idempotent so startup can call
//! them unconditionally; tests call them individually against `:memory:`.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets snapshot readers proceed while a shard write is in flight
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_all_tables(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_analysis_requests_table(pool).await?;
    create_recommendation_requests_table(pool).await?;
    create_documents_table(pool).await?;
    create_shared_videos_table(pool).await?;
    create_like_subjects_table(pool).await?;
    create_recommend_keywords_table(pool).await?;
    create_search_cache_table(pool).await?;
    create_daily_usage_table(pool).await?;

    info!("Database tables initialized");
    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs (API keys, key index).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the users table (teacher profiles)
///
/// `grades` and `subjects` hold JSON string arrays.
pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            uid TEXT PRIMARY KEY,
            email TEXT,
            display_name TEXT,
            role TEXT NOT NULL DEFAULT 'teacher',
            grades TEXT NOT NULL DEFAULT '[]',
            subjects TEXT NOT NULL DEFAULT '[]',
            analysis_count INTEGER NOT NULL DEFAULT 0,
            recommendation_count INTEGER NOT NULL DEFAULT 0,
            terms_accepted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the analysis_requests table
///
/// `status` is one of pending|processing|completed|error. `analysis` holds
/// the result JSON once completed.
pub async fn create_analysis_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_requests (
            id TEXT PRIMARY KEY,
            uid TEXT,
            anon_id TEXT,
            video_url TEXT NOT NULL,
            video_id TEXT NOT NULL,
            grade TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed', 'error')),
            chunks_done INTEGER NOT NULL DEFAULT 0,
            chunks_total INTEGER NOT NULL DEFAULT 0,
            analysis TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_requests_uid ON analysis_requests(uid, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the recommendation_requests table
pub async fn create_recommendation_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recommendation_requests (
            id TEXT PRIMARY KEY,
            uid TEXT,
            subject TEXT NOT NULL,
            grade TEXT NOT NULL,
            intention TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed', 'error')),
            keywords TEXT NOT NULL DEFAULT '[]',
            videos TEXT NOT NULL DEFAULT '[]',
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the documents table
///
/// Generic JSON documents addressed by `(collection, doc_id)`. Per-user
/// saved-video collections live here as a main document plus overflow shards.
pub async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, doc_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the shared_videos table (community board)
pub async fn create_shared_videos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shared_videos (
            id TEXT PRIMARY KEY,
            video_id TEXT NOT NULL,
            title TEXT NOT NULL,
            thumbnail_url TEXT,
            subject TEXT NOT NULL DEFAULT '',
            grade TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            memo TEXT NOT NULL DEFAULT '',
            sharer_uid TEXT NOT NULL,
            sharer_name TEXT,
            analysis TEXT,
            like_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the like_subjects table (one row per user per liked subject)
pub async fn create_like_subjects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS like_subjects (
            uid TEXT NOT NULL,
            subject TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (uid, subject)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the recommend_keywords table (keyword frequency per subject)
pub async fn create_recommend_keywords_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recommend_keywords (
            subject TEXT NOT NULL,
            keyword TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT NOT NULL,
            PRIMARY KEY (subject, keyword)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the search_cache table (YouTube search results with TTL)
pub async fn create_search_cache_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_cache (
            cache_key TEXT PRIMARY KEY,
            results TEXT NOT NULL,
            cached_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the daily_usage table
///
/// `subject_key` is `user:{uid}` or `anon:{anon_id}`; `date_key` is the
/// calendar-day string the count belongs to.
pub async fn create_daily_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_usage (
            subject_key TEXT PRIMARY KEY,
            date_key TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
