//! SSE event formatting for server-streaming routes.

use axum::response::sse::Event;

use super::error::TranscodeError;

/// Build the `data:` event carrying one rendered stream message.
///
/// Multi-line payloads are split into several `data:` lines by axum, which
/// SSE clients join back together.
#[must_use]
pub fn sse_message_event(rendered: &str) -> Event {
    Event::default().data(rendered)
}

/// The last event of a stream that ended in `err`.
///
/// Named `error` so clients can tell it from message events. Its data is the
/// object an HTTP error response nests under `"error"`:
///
/// ```text
/// event: error
/// data: {"code":503,"message":"backend gone","status":"UNAVAILABLE"}
/// ```
#[must_use]
pub fn sse_error_event(err: &TranscodeError) -> Event {
    let event = Event::default().event("error");
    match event.clone().json_data(err.to_json()) {
        Ok(event) => event,
        Err(_) => event.data(err.message()),
    }
}
