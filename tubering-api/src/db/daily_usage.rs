//! Daily usage quota
//!
//! One row per subject (`user:{uid}` / `anon:{id}`) holding the calendar
//! day the count belongs to. A stored day that differs from today means the
//! count is stale and restarts at zero.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tubering_common::time::date_key;
use tubering_common::Result;

use crate::models::{DailyLimitStatus, UsageSubject};

/// Report whether `subject` has used up today's quota
///
/// A row left over from an earlier day is reset to zero for `today`.
pub async fn check_daily_limit(
    pool: &SqlitePool,
    subject: &UsageSubject,
    today: NaiveDate,
) -> Result<DailyLimitStatus> {
    let key = subject.key();
    let today_key = date_key(today);

    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT date_key, count FROM daily_usage WHERE subject_key = ?")
            .bind(&key)
            .fetch_optional(pool)
            .await?;

    let count = match row {
        Some((stored_day, count)) if stored_day == today_key => count.max(0) as u32,
        Some((stored_day, _)) => {
            tracing::debug!(subject = %key, stored_day = %stored_day, "Resetting daily usage");
            sqlx::query("UPDATE daily_usage SET date_key = ?, count = 0 WHERE subject_key = ?")
                .bind(&today_key)
                .bind(&key)
                .execute(pool)
                .await?;
            0
        }
        None => 0,
    };

    Ok(DailyLimitStatus::new(count, subject.daily_limit(), today_key))
}

/// Count one use for `subject` today if the quota allows it
///
/// The check and the increment are a single conditional UPSERT, so
/// concurrent callers cannot both take the last slot. Returns the new count,
/// or `None` when today's count had already reached the limit.
pub async fn consume_daily_quota(
    pool: &SqlitePool,
    subject: &UsageSubject,
    today: NaiveDate,
) -> Result<Option<u32>> {
    let key = subject.key();
    let today_key = date_key(today);
    let limit = i64::from(subject.daily_limit());

    let count: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO daily_usage (subject_key, date_key, count) VALUES (?, ?, 1)
        ON CONFLICT(subject_key) DO UPDATE SET
            count = CASE WHEN daily_usage.date_key = excluded.date_key
                         THEN daily_usage.count + 1 ELSE 1 END,
            date_key = excluded.date_key
        WHERE daily_usage.date_key <> excluded.date_key OR daily_usage.count < ?
        RETURNING count
        "#,
    )
    .bind(&key)
    .bind(&today_key)
    .bind(limit)
    .fetch_optional(pool)
    .await?;

    Ok(count.map(|c| c.max(0) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_subject_not_exceeded() {
        let pool = setup_test_db().await;
        let subject = UsageSubject::User("u1".to_string());

        let status = check_daily_limit(&pool, &subject, day(18)).await.unwrap();

        assert!(!status.exceeded);
        assert_eq!(status.count, 0);
        assert_eq!(status.limit, 10);
        assert_eq!(status.date_key, "Sun Oct 18 2026");
    }

    #[tokio::test]
    async fn test_record_then_check_same_day() {
        let pool = setup_test_db().await;
        let subject = UsageSubject::Anonymous("a1".to_string());

        assert_eq!(consume_daily_quota(&pool, &subject, day(18)).await.unwrap(), Some(1));
        assert_eq!(consume_daily_quota(&pool, &subject, day(18)).await.unwrap(), Some(2));

        let status = check_daily_limit(&pool, &subject, day(18)).await.unwrap();
        assert_eq!(status.count, 2);
        assert_eq!(status.remaining, 1);
        assert!(!status.exceeded);
    }

    #[tokio::test]
    async fn test_record_on_new_day_restarts_count() {
        let pool = setup_test_db().await;
        let subject = UsageSubject::User("u1".to_string());

        for _ in 0..4 {
            consume_daily_quota(&pool, &subject, day(17)).await.unwrap();
        }

        assert_eq!(consume_daily_quota(&pool, &subject, day(18)).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_consume_refuses_once_limit_reached() {
        let pool = setup_test_db().await;
        let subject = UsageSubject::Anonymous("a1".to_string());

        for expected in 1..=3 {
            assert_eq!(
                consume_daily_quota(&pool, &subject, day(18)).await.unwrap(),
                Some(expected)
            );
        }
        assert_eq!(consume_daily_quota(&pool, &subject, day(18)).await.unwrap(), None);

        let status = check_daily_limit(&pool, &subject, day(18)).await.unwrap();
        assert_eq!(status.count, 3);
        assert!(status.exceeded);

        // A new day frees the quota even though the stored count is at the limit
        assert_eq!(consume_daily_quota(&pool, &subject, day(19)).await.unwrap(), Some(1));
    }
}
