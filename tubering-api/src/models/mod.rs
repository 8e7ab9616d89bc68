//! Data models for tubering-api

pub mod analysis;
pub mod board;
pub mod jjim;
pub mod recommendation;
pub mod usage;
pub mod user;

pub use analysis::{
    AnalysisRequest, Chapter, FlowMarker, RequestStatus, Severity, VideoAnalysis, Warning,
};
pub use board::SharedVideo;
pub use jjim::{JjimDocument, JjimFolder, JjimVideo};
pub use recommendation::{RecommendationRequest, RecommendedVideo};
pub use usage::{DailyLimitStatus, UsageSubject};
pub use user::UserProfile;
