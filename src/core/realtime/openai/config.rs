//! OpenAI Realtime endpoints and audio constants.

/// Data channel endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Endpoint that mints ephemeral client secrets.
pub const OPENAI_REALTIME_SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";

/// Model used when an agent does not name one.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Sample rate of the PCM16 audio the endpoint sends and expects.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Wire name of the only audio format the bridge carries upstream.
pub const PCM16_AUDIO_FORMAT: &str = "pcm16";
