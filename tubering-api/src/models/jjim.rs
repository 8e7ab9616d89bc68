//! Saved-video collection ("찜보따리") documents
//!
//! A user's collection is one logical record stored as a main document plus
//! zero or more overflow shards. Only the main document carries `folders`
//! and `add_lists`; every shard may carry `videos`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored document (main or overflow shard)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JjimDocument {
    #[serde(default)]
    pub folders: Vec<JjimFolder>,
    #[serde(default)]
    pub videos: Vec<JjimVideo>,
    /// Overflow shard suffixes (`{uid}_{n}`), main document only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_lists: Vec<u32>,
}

/// Folder node; folders form a tree through `parent_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JjimFolder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Saved video entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JjimVideo {
    /// Entry id (unique per saved entry, not per YouTube video)
    pub id: String,
    /// YouTube video id
    pub video_id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub memo: String,
    /// Snapshot of the analysis at save time
    #[serde(default)]
    pub analysis: Option<serde_json::Value>,
    pub added_at: DateTime<Utc>,
}

impl JjimDocument {
    /// Estimated stored size: serialized JSON byte length
    pub fn estimated_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(usize::MAX)
    }
}

impl JjimVideo {
    /// Estimated stored size of one entry
    pub fn estimated_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(usize::MAX)
    }
}
