//! Generic JSON document storage
//!
//! Documents are addressed by `(collection, doc_id)` and written whole
//! (last write wins), matching how the saved-video collections are used.

use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use tubering_common::Result;

/// Load and decode a document, `None` if absent
pub async fn get_document<T: DeserializeOwned>(
    pool: &SqlitePool,
    collection: &str,
    doc_id: &str,
) -> Result<Option<T>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(collection)
            .bind(doc_id)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((body,)) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

/// Encode and store a document, replacing any previous body
///
/// Returns the stored body length in bytes.
pub async fn put_document<T: Serialize>(
    pool: &SqlitePool,
    collection: &str,
    doc_id: &str,
    document: &T,
) -> Result<usize> {
    let body = serde_json::to_string(document)?;
    let size = body.len();

    sqlx::query(
        r#"
        INSERT INTO documents (collection, doc_id, body, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(collection, doc_id) DO UPDATE SET
            body = excluded.body,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(collection)
    .bind(doc_id)
    .bind(body)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(size)
}

/// Delete a document; returns whether it existed
pub async fn delete_document(pool: &SqlitePool, collection: &str, doc_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
        .bind(collection)
        .bind(doc_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
