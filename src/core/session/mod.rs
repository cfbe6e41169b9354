//! Session state machine: one per call.
//!
//! A session bridges a [`LocalAudioChannel`] (the caller) and a
//! [`BaseRealtime`](crate::core::realtime::BaseRealtime) provider (the model),
//! driving the call through `Connecting -> Ready -> Active -> Closing -> Closed`.

mod channel;
mod config;
mod error;
mod session;
mod sink;
mod state;

pub use channel::{
    BoxedLocalChannel, ChannelClosed, ChannelLocalAudio, LocalAudioChannel, LocalInput,
    LocalOutput, LocalPeer,
};
pub use config::{AgentConfig, AgentTurnDetection, DEFAULT_SYSTEM_PROMPT, SessionOptions};
pub use error::{ProtocolError, SessionError, SessionResult};
pub use session::{CloseReason, SessionDeps, SessionHandle, VoiceSession};
pub use sink::{
    CallSummary, HttpSink, MemorySink, SharedTranscriptSink, SinkError, TracingSink,
    TranscriptSink,
};
pub use state::{SessionState, StateMachine};
