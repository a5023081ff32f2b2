//! Server-Sent Events
//!
//! - GET /events: every FormcheckEvent (job progress, overlay toggles,
//!   selections, seek and play/pause requests for the player)
//! - GET /overlay/stream: render descriptions from the render driver

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const HEARTBEAT: Duration = Duration::from_secs(15);

/// GET /events
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: Client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("heartbeat"))
}

/// GET /overlay/stream
///
/// Sends the current frame immediately, then every change.
pub async fn overlay_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to overlay stream");

    let mut frames = state.frames.clone();

    let stream = async_stream::stream! {
        loop {
            let payload = serde_json::to_string(&*frames.borrow_and_update());
            match payload {
                Ok(json) => yield Ok(Event::default().event("frame").data(json)),
                Err(e) => warn!("SSE: Failed to serialize frame: {}", e),
            }

            if frames.changed().await.is_err() {
                debug!("SSE: Render driver stopped, closing overlay stream");
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("heartbeat"))
}
