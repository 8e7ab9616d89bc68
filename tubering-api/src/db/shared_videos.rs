//! Community board (shared videos)

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_string_list, parse_timestamp_column};
use crate::models::SharedVideo;

/// Fields supplied when sharing a video
#[derive(Debug, Clone, Deserialize)]
pub struct NewSharedVideo {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub memo: String,
    pub sharer_uid: String,
    #[serde(default)]
    pub sharer_name: Option<String>,
    #[serde(default)]
    pub analysis: Option<serde_json::Value>,
}

/// Board listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardFilter {
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub limit: Option<i64>,
}

const DEFAULT_LIMIT: i64 = 50;

/// Share a video to the board
pub async fn share_video(pool: &SqlitePool, new: NewSharedVideo) -> Result<SharedVideo> {
    let video = SharedVideo {
        id: Uuid::new_v4(),
        video_id: new.video_id,
        title: new.title,
        thumbnail_url: new.thumbnail_url,
        subject: new.subject,
        grade: new.grade,
        tags: new.tags,
        memo: new.memo,
        sharer_uid: new.sharer_uid,
        sharer_name: new.sharer_name,
        analysis: new.analysis,
        like_count: 0,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO shared_videos (
            id, video_id, title, thumbnail_url, subject, grade, tags, memo,
            sharer_uid, sharer_name, analysis, like_count, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(video.id.to_string())
    .bind(&video.video_id)
    .bind(&video.title)
    .bind(&video.thumbnail_url)
    .bind(&video.subject)
    .bind(&video.grade)
    .bind(serde_json::to_string(&video.tags)?)
    .bind(&video.memo)
    .bind(&video.sharer_uid)
    .bind(&video.sharer_name)
    .bind(video.analysis.as_ref().map(|a| a.to_string()))
    .bind(video.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(video)
}

/// Board entries, newest first
pub async fn list_shared(pool: &SqlitePool, filter: &BoardFilter) -> Result<Vec<SharedVideo>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT id, video_id, title, thumbnail_url, subject, grade, tags, memo,
               sharer_uid, sharer_name, analysis, like_count, created_at
        FROM shared_videos WHERE 1 = 1
        "#,
    );

    if let Some(subject) = filter.subject.as_deref().filter(|s| !s.is_empty()) {
        query.push(" AND subject = ").push_bind(subject.to_string());
    }
    if let Some(grade) = filter.grade.as_deref().filter(|g| !g.is_empty()) {
        query.push(" AND grade = ").push_bind(grade.to_string());
    }
    query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200));

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(shared_from_row).collect()
}

/// Load one entry
pub async fn load_shared(pool: &SqlitePool, id: Uuid) -> Result<Option<SharedVideo>> {
    let row = sqlx::query(
        r#"
        SELECT id, video_id, title, thumbnail_url, subject, grade, tags, memo,
               sharer_uid, sharer_name, analysis, like_count, created_at
        FROM shared_videos WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| shared_from_row(&r)).transpose()
}

/// Increment the like counter; returns the new count, `None` if absent
pub async fn like_shared(pool: &SqlitePool, id: Uuid) -> Result<Option<i64>> {
    let result = sqlx::query("UPDATE shared_videos SET like_count = like_count + 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let count: i64 = sqlx::query_scalar("SELECT like_count FROM shared_videos WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(Some(count))
}

/// Delete an entry if `uid` shared it; returns whether a row was removed
pub async fn delete_shared(pool: &SqlitePool, id: Uuid, uid: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM shared_videos WHERE id = ? AND sharer_uid = ?")
        .bind(id.to_string())
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn shared_from_row(row: &SqliteRow) -> Result<SharedVideo> {
    let id: String = row.get("id");
    let tags: String = row.get("tags");
    let analysis: Option<String> = row.get("analysis");
    let created_at: String = row.get("created_at");

    Ok(SharedVideo {
        id: Uuid::parse_str(&id)?,
        video_id: row.get("video_id"),
        title: row.get("title"),
        thumbnail_url: row.get("thumbnail_url"),
        subject: row.get("subject"),
        grade: row.get("grade"),
        tags: parse_string_list(&tags)?,
        memo: row.get("memo"),
        sharer_uid: row.get("sharer_uid"),
        sharer_name: row.get("sharer_name"),
        analysis: analysis.map(|a| serde_json::from_str(&a)).transpose()?,
        like_count: row.get("like_count"),
        created_at: parse_timestamp_column("created_at", &created_at)?,
    })
}
