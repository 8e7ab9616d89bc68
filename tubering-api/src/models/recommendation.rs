//! Video recommendation models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RequestStatus;

/// Recommended video summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedVideo {
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub channel_title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub duration_seconds: u32,
    pub view_count: u64,
    #[serde(default)]
    pub published_at: Option<String>,
    /// Search keyword that surfaced this video
    pub keyword: String,
}

/// Persisted recommendation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub id: Uuid,
    pub uid: Option<String>,
    pub subject: String,
    pub grade: String,
    /// Free-text teaching intention ("분수의 덧셈 도입용" …)
    pub intention: String,
    pub status: RequestStatus,
    pub keywords: Vec<String>,
    pub videos: Vec<RecommendedVideo>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecommendationRequest {
    pub fn new(uid: Option<String>, subject: String, grade: String, intention: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            uid,
            subject,
            grade,
            intention,
            status: RequestStatus::Pending,
            keywords: Vec::new(),
            videos: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
