//! Server-Sent Events stream for analysis and recommendation progress

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
///
/// Streams every `TuberingEvent`: analysis start, per-chunk progress,
/// completion and failure, plus recommendation completion and failure.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tubering_common::sse::create_event_sse_stream(&state.event_bus)
}
