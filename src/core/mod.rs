pub mod agents;
pub mod audio;
pub mod realtime;
pub mod session;
pub mod tools;
pub mod transcript;
pub mod turn;

pub use realtime::{
    BaseRealtime, BoxedRealtime, ControlEvent, EventNames, ModelEvent, OpenAIRealtime,
    RealtimeConfig, RealtimeError, RealtimeProvider, RealtimeResult, create_realtime_provider,
};

pub use session::{
    AgentConfig, CallSummary, ChannelLocalAudio, LocalAudioChannel, LocalInput, LocalOutput,
    SessionError, SessionOptions, SessionState, VoiceSession,
};

pub use agents::{AgentDirectory, DirectoryError, StaticAgentDirectory};
pub use tools::{ToolDispatcher, ToolExecutor};
pub use transcript::{Speaker, TranscriptAggregator, TranscriptEntry};
