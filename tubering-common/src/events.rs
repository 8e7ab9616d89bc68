//! Event types and event bus for Tubering
//!
//! Background analysis and recommendation tasks report progress through the
//! [`EventBus`]; the HTTP layer forwards events to browsers over SSE.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Tubering event types
///
/// Serialized with a `type` tag so SSE clients can dispatch on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TuberingEvent {
    /// Analysis request moved from pending to processing
    AnalysisStarted {
        request_id: Uuid,
        video_id: String,
        /// Number of chunks the video was split into (1 for quick analysis)
        chunks_total: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One chunk of a long-video analysis finished (successfully or degraded)
    AnalysisChunkCompleted {
        request_id: Uuid,
        chunks_done: u32,
        chunks_total: u32,
        /// False when the chunk degraded to an empty result
        succeeded: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Analysis request completed
    AnalysisCompleted {
        request_id: Uuid,
        safety_score: u8,
        warning_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Analysis request failed
    AnalysisFailed {
        request_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Recommendation request completed
    RecommendationCompleted {
        request_id: Uuid,
        video_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Recommendation request failed
    RecommendationFailed {
        request_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TuberingEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TuberingEvent::AnalysisStarted { .. } => "AnalysisStarted",
            TuberingEvent::AnalysisChunkCompleted { .. } => "AnalysisChunkCompleted",
            TuberingEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            TuberingEvent::AnalysisFailed { .. } => "AnalysisFailed",
            TuberingEvent::RecommendationCompleted { .. } => "RecommendationCompleted",
            TuberingEvent::RecommendationFailed { .. } => "RecommendationFailed",
        }
    }

    /// Request the event belongs to
    pub fn request_id(&self) -> Uuid {
        match self {
            TuberingEvent::AnalysisStarted { request_id, .. }
            | TuberingEvent::AnalysisChunkCompleted { request_id, .. }
            | TuberingEvent::AnalysisCompleted { request_id, .. }
            | TuberingEvent::AnalysisFailed { request_id, .. }
            | TuberingEvent::RecommendationCompleted { request_id, .. }
            | TuberingEvent::RecommendationFailed { request_id, .. } => *request_id,
        }
    }
}

/// Broadcast bus for [`TuberingEvent`]s
///
/// # Examples
///
/// ```
/// use tubering_common::events::EventBus;
///
/// let event_bus = EventBus::new(100);
/// let _rx = event_bus.subscribe();
/// assert_eq!(event_bus.subscriber_count(), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TuberingEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers
    /// start missing old events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TuberingEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    pub fn emit(
        &self,
        event: TuberingEvent,
    ) -> Result<usize, broadcast::error::SendError<TuberingEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TuberingEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
