//! # Tubering Common Library
//!
//! Shared code for the Tubering service crates:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Database initialization (schema creation)
//! - Event types and the event bus used for SSE
//! - Timestamp parsing/formatting and date keys

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;
pub mod timestamp;

pub use error::{Error, Result};
