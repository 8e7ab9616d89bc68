//! Services for tubering-api
//!
//! External clients (Gemini, YouTube) sit behind the [`GenerativeModel`] and
//! [`VideoCatalog`] traits so analysis and recommendation run against
//! scripted doubles in tests.

pub mod gemini_client;
pub mod json_extract;
pub mod key_rotation;
pub mod prompts;
pub mod recommendation;
pub mod video_analysis;
pub mod youtube_client;
pub mod youtube_url;

pub use gemini_client::{
    ApiKeySlot, GeminiClient, GeminiError, GenerationRequest, GenerativeModel, VideoClip,
};
pub use key_rotation::{
    with_key_rotation, KeyIndexStore, KeyRing, MemoryKeyIndex, RotatableError, RotationError,
    SettingsKeyIndex,
};
pub use recommendation::{random_keywords, run_recommendation_request, RecommendationError};
pub use video_analysis::{
    analyze_long_video, analyze_video, chunk_windows, quick_analysis, run_analysis_request,
    AnalysisError, ChunkWindow, NoProgress, ProgressSink, VideoInfo, CHUNK_SECONDS,
    FALLBACK_SAFETY_SCORE,
};
pub use youtube_client::{SearchHit, VideoCatalog, VideoDetails, YouTubeClient, YouTubeError};
pub use youtube_url::extract_video_id;

use sqlx::SqlitePool;
use std::sync::Arc;
use tubering_common::events::EventBus;

/// Collaborators for background analysis and recommendation tasks
#[derive(Clone)]
pub struct ServiceContext {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub model: Arc<dyn GenerativeModel>,
    pub catalog: Arc<dyn VideoCatalog>,
}
