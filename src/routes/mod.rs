use std::sync::Arc;

use axum::{Router, routing::get};

use crate::handlers;
use crate::state::AppState;

pub mod api;
pub mod realtime;

/// All routes with state applied. Cross-cutting layers (CORS, security
/// headers) are added by the binary.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::api::health_check))
        .merge(api::create_api_router())
        .merge(realtime::create_realtime_router())
        .with_state(state)
}
