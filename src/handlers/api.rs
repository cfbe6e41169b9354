use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::state::{AppState, SessionInfo};

/// Health check handler
///
/// Returns a simple JSON response indicating the server is running.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "active_sessions": state.session_count(),
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
    pub count: usize,
}

/// `GET /sessions`: sessions currently running on this process
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    let sessions = state.active_sessions();
    Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    })
}

/// `DELETE /sessions/{session_id}`: close one session through its normal closing path
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    if state.cancel_session(&session_id) {
        info!(%session_id, "Session close requested");
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(AppError::NotFound(format!("session '{session_id}'")))
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub agent_id: String,
    pub model: String,
    /// Short-lived bearer for the upstream realtime endpoint
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// `POST /agents/{agent_id}/token`: ephemeral upstream credential for a
/// browser client that talks to the model endpoint over WebRTC.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> AppResult<Json<TokenResponse>> {
    let agent = state.lookup_agent(&agent_id).await?;
    let credential = state.issue_token(&agent).await?;
    let model = agent
        .model
        .clone()
        .unwrap_or_else(|| state.config.realtime_model.clone());

    info!(%agent_id, "Issued ephemeral upstream credential");
    Ok(Json(TokenResponse {
        agent_id,
        model,
        client_secret: credential.token.clone(),
        expires_at: credential.expires_at,
    }))
}
