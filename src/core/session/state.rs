//! Session lifecycle states.
//!
//! ```text
//! +------------+
//! | Connecting |------------------+
//! +-----+------+                  |
//!       |                         |
//!       v                         |
//! +-----+------+                  |
//! |   Ready    |------------+     |
//! +-----+------+            |     |
//!       |                   |     |
//!       v                   |     v
//! +-----+------+            |  +--+-----+
//! |   Active   |---------+  |  | Failed |
//! +-----+------+         |  |  +--------+
//!       |                v  v
//!       |             +--+--+---+
//!       +------------>| Closing |
//!                     +----+----+
//!                          |
//!                          v
//!                     +----+----+
//!                     | Closed  |
//!                     +---------+
//! ```
//!
//! `Failed` is reachable from every non-terminal state.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use super::error::SessionError;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Channels and credentials are being established
    Connecting,

    /// Both channels open and session configuration acknowledged
    Ready,

    /// Audio and events flowing
    Active,

    /// Termination in progress
    Closing,

    /// All resources released
    Closed,

    /// Connection or setup failed
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

impl SessionState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Check if the session is tearing down or gone
    pub fn is_closing_or_closed(&self) -> bool {
        matches!(
            self,
            SessionState::Closing | SessionState::Closed | SessionState::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed | Failed, _) => false,
            (_, Failed) => true,
            (Connecting, Ready) => true,
            (Ready, Active | Closing) => true,
            (Active, Closing) => true,
            (Closing, Closed) => true,
            _ => false,
        }
    }
}

/// The single place a session's state changes.
///
/// Observers get a [`watch::Receiver`] so the registry and transports can
/// follow the lifecycle without sharing the session itself.
#[derive(Debug)]
pub struct StateMachine {
    session_id: String,
    tx: watch::Sender<SessionState>,
}

impl StateMachine {
    pub fn new(session_id: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(SessionState::Connecting);
        Self {
            session_id: session_id.into(),
            tx,
        }
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move to `next`.
    ///
    /// Returns `Ok(false)` when the session is already in `next` and `next`
    /// is `Closing` or `Closed`: closing twice is a no-op, never an error.
    pub fn transition(&self, next: SessionState) -> Result<bool, SessionError> {
        let current = self.current();
        if current == next && matches!(next, SessionState::Closing | SessionState::Closed) {
            debug!(session_id = %self.session_id, state = %next, "Already in state");
            return Ok(false);
        }
        if current == SessionState::Closed && next == SessionState::Closing {
            return Ok(false);
        }
        if !current.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        self.tx.send_replace(next);
        info!(session_id = %self.session_id, from = %current, to = %next, "Session state changed");
        Ok(true)
    }
}
