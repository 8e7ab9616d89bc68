//! Recommendation request database operations

use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{parse_string_list, parse_timestamp_column};
use crate::models::{RecommendationRequest, RecommendedVideo, RequestStatus};

/// Insert a new request
pub async fn save_request(pool: &SqlitePool, request: &RecommendationRequest) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recommendation_requests (
            id, uid, subject, grade, intention, status, keywords, videos,
            error_message, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.id.to_string())
    .bind(&request.uid)
    .bind(&request.subject)
    .bind(&request.grade)
    .bind(&request.intention)
    .bind(request.status.as_str())
    .bind(serde_json::to_string(&request.keywords)?)
    .bind(serde_json::to_string(&request.videos)?)
    .bind(&request.error_message)
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a request by id
pub async fn load_request(pool: &SqlitePool, id: Uuid) -> Result<Option<RecommendationRequest>> {
    let row = sqlx::query(
        r#"
        SELECT id, uid, subject, grade, intention, status, keywords, videos,
               error_message, created_at, updated_at
        FROM recommendation_requests
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| request_from_row(&r)).transpose()
}

/// Move to processing
pub async fn mark_processing(pool: &SqlitePool, id: Uuid) -> Result<()> {
    set_status(pool, id, RequestStatus::Processing).await
}

/// Store keywords and videos and mark completed
pub async fn complete_request(
    pool: &SqlitePool,
    id: Uuid,
    keywords: &[String],
    videos: &[RecommendedVideo],
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE recommendation_requests
        SET status = 'completed', keywords = ?, videos = ?, error_message = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(serde_json::to_string(keywords)?)
    .bind(serde_json::to_string(videos)?)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark failed with a message
pub async fn fail_request(pool: &SqlitePool, id: Uuid, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE recommendation_requests SET status = 'error', error_message = ?, updated_at = ? WHERE id = ?",
    )
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

async fn set_status(pool: &SqlitePool, id: Uuid, status: RequestStatus) -> Result<()> {
    sqlx::query("UPDATE recommendation_requests SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn request_from_row(row: &SqliteRow) -> Result<RecommendationRequest> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let keywords: String = row.get("keywords");
    let videos: String = row.get("videos");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(RecommendationRequest {
        id: Uuid::parse_str(&id)?,
        uid: row.get("uid"),
        subject: row.get("subject"),
        grade: row.get("grade"),
        intention: row.get("intention"),
        status: status.parse::<RequestStatus>().map_err(anyhow::Error::msg)?,
        keywords: parse_string_list(&keywords)?,
        videos: serde_json::from_str(&videos)?,
        error_message: row.get("error_message"),
        created_at: parse_timestamp_column("created_at", &created_at)?,
        updated_at: parse_timestamp_column("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    #[tokio::test]
    async fn test_complete_stores_videos() {
        let pool = setup_test_db().await;
        let request = RecommendationRequest::new(
            Some("u1".to_string()),
            "과학".to_string(),
            "중1".to_string(),
            "광합성 도입".to_string(),
        );
        save_request(&pool, &request).await.unwrap();
        mark_processing(&pool, request.id).await.unwrap();

        let video = RecommendedVideo {
            video_id: "abcdefghijk".to_string(),
            url: "https://www.youtube.com/watch?v=abcdefghijk".to_string(),
            title: "광합성".to_string(),
            channel_title: "EBS".to_string(),
            thumbnail_url: None,
            duration_seconds: 420,
            view_count: 1000,
            published_at: None,
            keyword: "광합성 실험".to_string(),
        };
        complete_request(&pool, request.id, &["광합성 실험".to_string()], &[video])
            .await
            .unwrap();

        let loaded = load_request(&pool, request.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RequestStatus::Completed);
        assert_eq!(loaded.keywords, vec!["광합성 실험"]);
        assert_eq!(loaded.videos.len(), 1);
        assert_eq!(loaded.videos[0].duration_seconds, 420);
    }

    #[tokio::test]
    async fn test_fail_request() {
        let pool = setup_test_db().await;
        let request = RecommendationRequest::new(
            None,
            "수학".to_string(),
            "초4".to_string(),
            String::new(),
        );
        save_request(&pool, &request).await.unwrap();

        fail_request(&pool, request.id, "quota").await.unwrap();

        let loaded = load_request(&pool, request.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RequestStatus::Error);
        assert_eq!(loaded.error_message.as_deref(), Some("quota"));
    }
}
