//! Tests for database initialization
//!
//! Verifies automatic creation on first run, reopening an existing database,
//! and that every table the service relies on exists.

use tempfile::TempDir;
use tubering_common::db::init::init_database;

const EXPECTED_TABLES: &[&str] = &[
    "analysis_requests",
    "daily_usage",
    "documents",
    "like_subjects",
    "recommend_keywords",
    "recommendation_requests",
    "search_cache",
    "settings",
    "shared_videos",
    "users",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("tubering.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tubering.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO settings (key, value) VALUES ('marker', 'kept')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Second open must not wipe existing data
    let pool2 = init_database(&db_path).await.unwrap();
    let value: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'marker'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(value, "kept");
}

#[tokio::test]
async fn test_all_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("tubering.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in EXPECTED_TABLES {
        assert!(
            tables.iter().any(|t| t == expected),
            "Missing table '{}', found: {:?}",
            expected,
            tables
        );
    }
}

#[tokio::test]
async fn test_status_check_constraint() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("tubering.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO analysis_requests (id, video_url, video_id, grade, status, created_at, updated_at)
         VALUES ('r1', 'u', 'v', '3', 'bogus', 'now', 'now')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Unknown status should violate the CHECK constraint");
}
