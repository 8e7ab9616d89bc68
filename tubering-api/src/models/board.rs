//! Community board model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Video shared to the community board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedVideo {
    pub id: Uuid,
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub subject: String,
    pub grade: String,
    pub tags: Vec<String>,
    pub memo: String,
    pub sharer_uid: String,
    pub sharer_name: Option<String>,
    pub analysis: Option<serde_json::Value>,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
}
