//! Video analysis models
//!
//! An [`AnalysisRequest`] moves through four states:
//! PENDING → PROCESSING → COMPLETED | ERROR

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tubering_common::timestamp::format_timestamp;
use uuid::Uuid;

/// Lifecycle state shared by analysis and recommendation requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Created, background task not yet running
    Pending,
    /// Background task running
    Processing,
    /// Result stored
    Completed,
    /// Failed; `error_message` explains why
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Error)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "processing" => Ok(RequestStatus::Processing),
            "completed" => Ok(RequestStatus::Completed),
            "error" => Ok(RequestStatus::Error),
            other => Err(format!("Unknown request status: {}", other)),
        }
    }
}

/// Warning severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Map the free-form severity an LLM returns onto the three levels
    ///
    /// Korean and English labels are both accepted; anything unrecognized
    /// is treated as medium.
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "low" | "minor" | "mild" | "낮음" | "경미" | "하" => Severity::Low,
            "high" | "severe" | "critical" | "높음" | "심각" | "상" => Severity::High,
            _ => Severity::Medium,
        }
    }
}

/// A time-bounded content warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub start_seconds: u32,
    pub end_seconds: u32,
    /// `start_seconds` formatted as `M:SS` / `H:MM:SS`
    pub start_time: String,
    /// `end_seconds` formatted as `M:SS` / `H:MM:SS`
    pub end_time: String,
    /// Category, e.g. "폭력성", "언어"
    pub tag: String,
    pub severity: Severity,
    pub description: String,
}

impl Warning {
    pub fn new(
        start_seconds: u32,
        end_seconds: u32,
        tag: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        let end_seconds = end_seconds.max(start_seconds);
        Self {
            start_seconds,
            end_seconds,
            start_time: format_timestamp(start_seconds),
            end_time: format_timestamp(end_seconds),
            tag: tag.into(),
            severity,
            description: description.into(),
        }
    }
}

/// Topic-change marker within the video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMarker {
    pub seconds: u32,
    pub timestamp: String,
    pub topic: String,
}

impl FlowMarker {
    pub fn new(seconds: u32, topic: impl Into<String>) -> Self {
        Self {
            seconds,
            timestamp: format_timestamp(seconds),
            topic: topic.into(),
        }
    }
}

/// Chapter heading (quick analysis only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub seconds: u32,
    pub timestamp: String,
    pub title: String,
}

impl Chapter {
    pub fn new(seconds: u32, title: impl Into<String>) -> Self {
        Self {
            seconds,
            timestamp: format_timestamp(seconds),
            title: title.into(),
        }
    }
}

/// Result of analyzing one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub video_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub duration_seconds: u32,
    pub grade: String,
    pub summary: String,
    /// 0-100 classroom-appropriateness estimate
    pub safety_score: u8,
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub flow: Vec<FlowMarker>,
    /// Number of 600-second windows analyzed (1 for quick analysis)
    pub chunk_count: u32,
    /// Indices of windows whose request or parse failed
    #[serde(default)]
    pub failed_chunks: Vec<u32>,
    /// True when any window failed or the summary fell back to defaults
    #[serde(default)]
    pub partial: bool,
    pub analyzed_at: DateTime<Utc>,
}

/// Persisted analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub uid: Option<String>,
    pub anon_id: Option<String>,
    pub video_url: String,
    pub video_id: String,
    pub grade: String,
    pub status: RequestStatus,
    pub chunks_done: u32,
    pub chunks_total: u32,
    pub analysis: Option<VideoAnalysis>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRequest {
    /// Create a new pending request
    pub fn new(
        video_url: String,
        video_id: String,
        grade: String,
        uid: Option<String>,
        anon_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            uid,
            anon_id,
            video_url,
            video_id,
            grade,
            status: RequestStatus::Pending,
            chunks_done: 0,
            chunks_total: 0,
            analysis: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Processing,
            RequestStatus::Completed,
            RequestStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("done".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Processing.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Error.is_terminal());
    }

    #[test]
    fn test_severity_normalize() {
        assert_eq!(Severity::normalize("HIGH"), Severity::High);
        assert_eq!(Severity::normalize("높음"), Severity::High);
        assert_eq!(Severity::normalize(" low "), Severity::Low);
        assert_eq!(Severity::normalize("경미"), Severity::Low);
        assert_eq!(Severity::normalize("medium"), Severity::Medium);
        assert_eq!(Severity::normalize("???"), Severity::Medium);
    }

    #[test]
    fn test_warning_formats_times_and_orders_bounds() {
        let w = Warning::new(750, 700, "언어", Severity::Low, "비속어");
        assert_eq!(w.start_time, "12:30");
        // End never precedes start
        assert_eq!(w.end_seconds, 750);
        assert_eq!(w.end_time, "12:30");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&RequestStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
