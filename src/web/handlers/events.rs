//! Event stream handler.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{Event as SseEvent, Sse},
};
use futures::{Stream, StreamExt};

use super::AppState;
use crate::chat::Frame;
use crate::web::middleware::cors::LAST_EVENT_ID;

/// Parse the `Last-Event-ID` header.
fn last_event_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Render a frame as an SSE event.
fn to_sse(frame: &Frame) -> SseEvent {
    let event = SseEvent::default().id(frame.id.to_string());
    match frame.to_json() {
        Ok(json) => event.data(json),
        Err(e) => {
            tracing::warn!(event_id = frame.id, error = %e, "Failed to serialize event");
            event.comment("unserializable event")
        }
    }
}

/// GET /events - Stream history then live events.
///
/// Clients resuming with `Last-Event-ID` receive only later events. Closing
/// the connection drops the subscription.
pub async fn events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let resume = last_event_id(&headers);
    let subscription = state.broadcaster.subscribe_after(resume);

    tracing::debug!(
        subscriber = %subscription.id(),
        replay = subscription.pending_replay(),
        resume = ?resume,
        "Event stream opened"
    );

    Sse::new(subscription.map(|frame| Ok(to_sse(&frame))))
}
