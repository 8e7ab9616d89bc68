//! Teacher profile database operations

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::{parse_string_list, parse_timestamp_column};
use crate::models::UserProfile;

/// Fields a client may set on a profile
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub grades: Option<Vec<String>>,
    pub subjects: Option<Vec<String>>,
}

/// Create or update a profile; unspecified fields keep their stored value
pub async fn upsert_profile(
    pool: &SqlitePool,
    uid: &str,
    update: &ProfileUpdate,
) -> Result<UserProfile> {
    let now = Utc::now().to_rfc3339();
    let grades = update
        .grades
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let subjects = update
        .subjects
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO users (uid, email, display_name, role, grades, subjects, created_at, updated_at)
        VALUES (?, ?, ?, COALESCE(?, 'teacher'), COALESCE(?, '[]'), COALESCE(?, '[]'), ?, ?)
        ON CONFLICT(uid) DO UPDATE SET
            email = COALESCE(excluded.email, users.email),
            display_name = COALESCE(excluded.display_name, users.display_name),
            role = COALESCE(?, users.role),
            grades = COALESCE(?, users.grades),
            subjects = COALESCE(?, users.subjects),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(uid)
    .bind(&update.email)
    .bind(&update.display_name)
    .bind(&update.role)
    .bind(&grades)
    .bind(&subjects)
    .bind(&now)
    .bind(&now)
    .bind(&update.role)
    .bind(&grades)
    .bind(&subjects)
    .execute(pool)
    .await?;

    load_profile(pool, uid)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Profile {} missing after upsert", uid))
}

/// Load a profile by uid
pub async fn load_profile(pool: &SqlitePool, uid: &str) -> Result<Option<UserProfile>> {
    let row = sqlx::query(
        r#"
        SELECT uid, email, display_name, role, grades, subjects,
               analysis_count, recommendation_count, terms_accepted_at,
               created_at, updated_at
        FROM users
        WHERE uid = ?
        "#,
    )
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let grades: String = row.get("grades");
            let subjects: String = row.get("subjects");
            let terms: Option<String> = row.get("terms_accepted_at");
            let created_at: String = row.get("created_at");
            let updated_at: String = row.get("updated_at");

            Ok(Some(UserProfile {
                uid: row.get("uid"),
                email: row.get("email"),
                display_name: row.get("display_name"),
                role: row.get("role"),
                grades: parse_string_list(&grades)?,
                subjects: parse_string_list(&subjects)?,
                analysis_count: row.get("analysis_count"),
                recommendation_count: row.get("recommendation_count"),
                terms_accepted_at: terms
                    .map(|t| parse_timestamp_column("terms_accepted_at", &t))
                    .transpose()?,
                created_at: parse_timestamp_column("created_at", &created_at)?,
                updated_at: parse_timestamp_column("updated_at", &updated_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Record terms acceptance; returns false when the profile doesn't exist
pub async fn accept_terms(pool: &SqlitePool, uid: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let result =
        sqlx::query("UPDATE users SET terms_accepted_at = ?, updated_at = ? WHERE uid = ?")
            .bind(&now)
            .bind(&now)
            .bind(uid)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Bump the analysis counter (no-op for unknown uid)
pub async fn increment_analysis_count(pool: &SqlitePool, uid: &str) -> Result<()> {
    sqlx::query("UPDATE users SET analysis_count = analysis_count + 1 WHERE uid = ?")
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}

/// Bump the recommendation counter (no-op for unknown uid)
pub async fn increment_recommendation_count(pool: &SqlitePool, uid: &str) -> Result<()> {
    sqlx::query("UPDATE users SET recommendation_count = recommendation_count + 1 WHERE uid = ?")
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}
