//! Realtime voice WebSocket transport
//!
//! One WebSocket carries one call to one agent.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **Binary frames**: caller audio, PCM 16-bit mono at the local sample
//!   rate, exactly one frame (`FRAME_DURATION_MS`) per message
//! - **speech_started**: client-side voice activity detected caller speech
//! - **hangup**: caller ended the call
//!
//! ## Server → Client
//!
//! - **Binary frames**: agent playback audio, same format, one frame per message
//! - **session_ready**: upstream is configured, audio may flow
//! - **transcript**: newly finalized transcript entries
//! - **clear_playback**: drop any audio still buffered for playback
//! - **notice**: status message for the caller
//! - **closing**: session is ending, with a short reason code

mod handler;
pub mod messages;

pub use handler::{WebSocketLocalChannel, realtime_handler};
