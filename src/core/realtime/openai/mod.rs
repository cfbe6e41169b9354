//! OpenAI Realtime API over WebSocket.
//!
//! Audio in both directions is PCM16 mono at 24 kHz, base64 encoded inside
//! JSON events.

mod client;
mod config;
mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    OPENAI_DEFAULT_MODEL, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_SESSIONS_URL,
    OPENAI_REALTIME_URL, PCM16_AUDIO_FORMAT,
};
pub use messages::{MALFORMED_ERROR_MESSAGE, OpenAIProtocol, SessionConfig, TurnDetection};
