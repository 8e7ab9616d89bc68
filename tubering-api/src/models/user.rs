//! Teacher profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: String,
    /// Preferred grade levels
    pub grades: Vec<String>,
    /// Preferred subjects
    pub subjects: Vec<String>,
    pub analysis_count: i64,
    pub recommendation_count: i64,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
