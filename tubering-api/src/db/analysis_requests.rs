//! Analysis request database operations
//!
//! Status transitions are plain UPDATEs; the background task is the only
//! writer after creation.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::parse_timestamp_column;
use crate::models::{AnalysisRequest, RequestStatus, VideoAnalysis};

const SELECT_COLUMNS: &str = r#"
    SELECT id, uid, anon_id, video_url, video_id, grade, status,
           chunks_done, chunks_total, analysis, error_message,
           created_at, updated_at
    FROM analysis_requests
"#;

/// Insert a new request
pub async fn save_request(pool: &SqlitePool, request: &AnalysisRequest) -> Result<()> {
    let analysis = request
        .analysis
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO analysis_requests (
            id, uid, anon_id, video_url, video_id, grade, status,
            chunks_done, chunks_total, analysis, error_message,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.id.to_string())
    .bind(&request.uid)
    .bind(&request.anon_id)
    .bind(&request.video_url)
    .bind(&request.video_id)
    .bind(&request.grade)
    .bind(request.status.as_str())
    .bind(request.chunks_done as i64)
    .bind(request.chunks_total as i64)
    .bind(analysis)
    .bind(&request.error_message)
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a request by id
pub async fn load_request(pool: &SqlitePool, id: Uuid) -> Result<Option<AnalysisRequest>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| request_from_row(&r)).transpose()
}

/// A user's requests, newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    uid: &str,
    limit: i64,
) -> Result<Vec<AnalysisRequest>> {
    let rows = sqlx::query(&format!(
        "{} WHERE uid = ? ORDER BY created_at DESC LIMIT ?",
        SELECT_COLUMNS
    ))
    .bind(uid)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(request_from_row).collect()
}

/// Move to processing and record how many chunks will run
pub async fn mark_processing(pool: &SqlitePool, id: Uuid, chunks_total: u32) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE analysis_requests
        SET status = 'processing', chunks_total = ?, chunks_done = 0, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(chunks_total as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record chunk progress
pub async fn update_progress(pool: &SqlitePool, id: Uuid, chunks_done: u32) -> Result<()> {
    sqlx::query("UPDATE analysis_requests SET chunks_done = ?, updated_at = ? WHERE id = ?")
        .bind(chunks_done as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Store the result and mark completed
pub async fn complete_request(
    pool: &SqlitePool,
    id: Uuid,
    analysis: &VideoAnalysis,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE analysis_requests
        SET status = 'completed', analysis = ?, chunks_done = chunks_total,
            error_message = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(serde_json::to_string(analysis)?)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark failed with a message
pub async fn fail_request(pool: &SqlitePool, id: Uuid, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE analysis_requests SET status = 'error', error_message = ?, updated_at = ? WHERE id = ?",
    )
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

fn request_from_row(row: &SqliteRow) -> Result<AnalysisRequest> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let analysis: Option<String> = row.get("analysis");
    let chunks_done: i64 = row.get("chunks_done");
    let chunks_total: i64 = row.get("chunks_total");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(AnalysisRequest {
        id: Uuid::parse_str(&id)?,
        uid: row.get("uid"),
        anon_id: row.get("anon_id"),
        video_url: row.get("video_url"),
        video_id: row.get("video_id"),
        grade: row.get("grade"),
        status: status.parse::<RequestStatus>().map_err(anyhow::Error::msg)?,
        chunks_done: chunks_done.max(0) as u32,
        chunks_total: chunks_total.max(0) as u32,
        analysis: analysis
            .map(|a| serde_json::from_str::<VideoAnalysis>(&a))
            .transpose()
            .context("Failed to decode stored analysis")?,
        error_message: row.get("error_message"),
        created_at: parse_timestamp_column("created_at", &created_at)?,
        updated_at: parse_timestamp_column("updated_at", &updated_at)?,
    })
}
