//! Realtime WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::realtime_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the Realtime WebSocket router
///
/// # Endpoint
///
/// `GET /realtime/{agent_id}` - WebSocket upgrade for one call to one agent
///
/// Unknown agents are rejected with 404, inactive agents with 403 and a full
/// server with 503, all before the upgrade.
///
/// # Example
///
/// ```json
/// // Server, once upstream is configured
/// {"type": "session_ready", "session_id": "..."}
///
/// // Client sends binary PCM16 frames, and optionally
/// {"type": "speech_started"}
///
/// // Server sends binary playback frames, transcripts and
/// {"type": "clear_playback"}
/// {"type": "closing", "reason": "hangup"}
/// ```
pub fn create_realtime_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/realtime/{agent_id}", get(realtime_handler))
        .layer(TraceLayer::new_for_http())
}
