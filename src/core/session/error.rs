use std::time::Duration;

use thiserror::Error;

use super::state::SessionState;
use crate::core::audio::AudioError;
use crate::core::realtime::RealtimeError;

/// Conversation-level protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A function-call request reused an open or answered call id
    #[error("Duplicate call_id: {0}")]
    DuplicateCallId(String),

    /// A function-call output has no open invocation
    #[error("Unknown call_id: {0}")]
    UnknownCallId(String),

    /// The upstream reported an explicit error
    #[error("Upstream error ({}): {message}", code.as_deref().unwrap_or("unknown"))]
    Upstream {
        code: Option<String>,
        message: String,
        fatal: bool,
    },
}

impl ProtocolError {
    /// Severe errors end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Upstream { fatal: true, .. })
    }
}

/// Errors that end or prevent a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Local audio or upstream channel failed
    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Upstream did not become ready in time
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Invalid agent or session configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

impl From<RealtimeError> for SessionError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::InvalidConfiguration(msg) => SessionError::Configuration(msg),
            other => SessionError::Transport(other.to_string()),
        }
    }
}

impl From<AudioError> for SessionError {
    fn from(err: AudioError) -> Self {
        SessionError::Configuration(err.to_string())
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
