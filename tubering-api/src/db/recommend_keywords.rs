//! Keyword frequency capture for recommendations
//!
//! Every keyword generated for a subject bumps its counter; the random
//! keyword feature samples from these counts.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

/// Keyword with its usage count
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: i64,
}

/// Increment counters for each keyword under `subject`
pub async fn record_keywords(pool: &SqlitePool, subject: &str, keywords: &[String]) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    for keyword in keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        sqlx::query(
            r#"
            INSERT INTO recommend_keywords (subject, keyword, count, last_used_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(subject, keyword) DO UPDATE SET
                count = count + 1,
                last_used_at = excluded.last_used_at
            "#,
        )
        .bind(subject)
        .bind(keyword)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Most frequent keywords for a subject
pub async fn top_keywords(pool: &SqlitePool, subject: &str, limit: i64) -> Result<Vec<KeywordCount>> {
    let rows = sqlx::query_as::<_, KeywordCount>(
        r#"
        SELECT keyword, count FROM recommend_keywords
        WHERE subject = ?
        ORDER BY count DESC, last_used_at DESC
        LIMIT ?
        "#,
    )
    .bind(subject)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every keyword recorded for a subject
pub async fn all_keywords(pool: &SqlitePool, subject: &str) -> Result<Vec<KeywordCount>> {
    let rows = sqlx::query_as::<_, KeywordCount>(
        "SELECT keyword, count FROM recommend_keywords WHERE subject = ? ORDER BY keyword",
    )
    .bind(subject)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    fn kw(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_record_counts_per_subject() {
        let pool = setup_test_db().await;

        record_keywords(&pool, "과학", &kw(&["광합성", "화산"])).await.unwrap();
        record_keywords(&pool, "과학", &kw(&["광합성", " "])).await.unwrap();
        record_keywords(&pool, "수학", &kw(&["광합성"])).await.unwrap();

        let top = top_keywords(&pool, "과학", 10).await.unwrap();
        assert_eq!(
            top,
            vec![
                KeywordCount { keyword: "광합성".into(), count: 2 },
                KeywordCount { keyword: "화산".into(), count: 1 },
            ]
        );
        assert_eq!(all_keywords(&pool, "수학").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_top_respects_limit() {
        let pool = setup_test_db().await;
        record_keywords(&pool, "s", &kw(&["a", "b", "c"])).await.unwrap();

        assert_eq!(top_keywords(&pool, "s", 2).await.unwrap().len(), 2);
        assert!(top_keywords(&pool, "none", 2).await.unwrap().is_empty());
    }
}
