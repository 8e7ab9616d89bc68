//! HTTP API handlers for tubering-api
//!
//! JSON over HTTP plus an SSE stream for background task progress.

pub mod analysis;
pub mod board;
pub mod health;
pub mod jjim;
pub mod recommendation;
pub mod settings;
pub mod sse;
pub mod usage;
pub mod users;

pub use analysis::analysis_routes;
pub use board::board_routes;
pub use health::health_routes;
pub use jjim::jjim_routes;
pub use recommendation::recommendation_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
pub use usage::usage_routes;
pub use users::user_routes;
