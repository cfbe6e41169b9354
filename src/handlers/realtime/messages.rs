//! Realtime WebSocket message types
//!
//! Audio travels as binary frames. Everything else is a JSON text frame
//! tagged with `type`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::session::{LocalInput, LocalOutput};
use crate::core::transcript::TranscriptEntry;

/// Maximum allowed size for a client text message (4 KB)
pub const MAX_TEXT_SIZE: usize = 4 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket text messages from the caller's client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeIncomingMessage {
    /// Client-side voice activity detected caller speech
    SpeechStarted,
    /// Caller ended the call
    Hangup,
}

impl From<RealtimeIncomingMessage> for LocalInput {
    fn from(message: RealtimeIncomingMessage) -> Self {
        match message {
            RealtimeIncomingMessage::SpeechStarted => LocalInput::SpeechStarted,
            RealtimeIncomingMessage::Hangup => LocalInput::Hangup,
        }
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket text messages to the caller's client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeOutgoingMessage {
    /// Session is ready; audio may flow
    SessionReady { session_id: String },
    /// Newly finalized transcript entries
    Transcript { entries: Vec<TranscriptEntry> },
    /// Drop any playback audio already buffered on the client
    ClearPlayback,
    /// Status message for the caller
    Notice { message: String },
    /// Session is ending
    Closing { reason: String },
}

impl RealtimeOutgoingMessage {
    /// Text form of a session output. Audio has none.
    pub fn from_output(output: LocalOutput) -> Option<Self> {
        match output {
            LocalOutput::Ready { session_id } => Some(Self::SessionReady { session_id }),
            LocalOutput::Transcript(entries) => Some(Self::Transcript { entries }),
            LocalOutput::ClearPlayback => Some(Self::ClearPlayback),
            LocalOutput::Notice(message) => Some(Self::Notice { message }),
            LocalOutput::Closing { reason } => Some(Self::Closing { reason }),
            LocalOutput::Audio(_) => None,
        }
    }
}

/// Work item for the socket writer task
#[derive(Debug)]
pub enum RealtimeMessageRoute {
    Outgoing(RealtimeOutgoingMessage),
    /// Playback frame tagged with the playback generation it belongs to
    Audio { generation: u64, data: Bytes },
    Close,
}
