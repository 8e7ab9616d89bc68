//! Per-subject likes

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

/// Like count for one subject
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SubjectLikes {
    pub subject: String,
    pub likes: i64,
}

/// Toggle a user's like; returns true when the subject is now liked
pub async fn toggle_like(pool: &SqlitePool, uid: &str, subject: &str) -> Result<bool> {
    let removed = sqlx::query("DELETE FROM like_subjects WHERE uid = ? AND subject = ?")
        .bind(uid)
        .bind(subject)
        .execute(pool)
        .await?
        .rows_affected();

    if removed > 0 {
        return Ok(false);
    }

    sqlx::query("INSERT INTO like_subjects (uid, subject, created_at) VALUES (?, ?, ?)")
        .bind(uid)
        .bind(subject)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    Ok(true)
}

/// Like counts for every subject, most liked first
pub async fn like_counts(pool: &SqlitePool) -> Result<Vec<SubjectLikes>> {
    let rows = sqlx::query_as::<_, SubjectLikes>(
        r#"
        SELECT subject, COUNT(*) AS likes FROM like_subjects
        GROUP BY subject
        ORDER BY likes DESC, subject
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Subjects a user has liked
pub async fn liked_by(pool: &SqlitePool, uid: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT subject FROM like_subjects WHERE uid = ? ORDER BY subject")
            .bind(uid)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    #[tokio::test]
    async fn test_toggle_twice_unlikes() {
        let pool = setup_test_db().await;

        assert!(toggle_like(&pool, "u1", "과학").await.unwrap());
        assert_eq!(liked_by(&pool, "u1").await.unwrap(), vec!["과학"]);

        assert!(!toggle_like(&pool, "u1", "과학").await.unwrap());
        assert!(liked_by(&pool, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_ordered() {
        let pool = setup_test_db().await;
        toggle_like(&pool, "u1", "수학").await.unwrap();
        toggle_like(&pool, "u1", "과학").await.unwrap();
        toggle_like(&pool, "u2", "과학").await.unwrap();

        let counts = like_counts(&pool).await.unwrap();
        assert_eq!(
            counts,
            vec![
                SubjectLikes { subject: "과학".into(), likes: 2 },
                SubjectLikes { subject: "수학".into(), likes: 1 },
            ]
        );
    }
}
