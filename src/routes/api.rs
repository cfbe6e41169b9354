use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(api::list_sessions))
        .route("/sessions/{session_id}", delete(api::close_session))
        .route("/agents/{agent_id}/token", post(api::issue_token))
        .layer(TraceLayer::new_for_http())
}
