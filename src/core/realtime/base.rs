//! Upstream provider capability and its configuration.
//!
//! A provider owns the duplex channel to a conversational model endpoint. It
//! translates wire events into [`ModelEvent`]s, encodes [`ControlEvent`]s and
//! audio, and makes no conversational decisions of its own.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use super::credentials::CredentialMode;
use super::events::{ControlEvent, EventNames, ModelEvent};

/// Failures of the upstream data channel.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Missing key, rejected key or failed credential exchange
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Upstream event that could not be decoded
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Control event or audio that could not be encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The channel is not open, or has already closed
    #[error("Not connected")]
    NotConnected,
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// What the session tells the model about the agent, sent as the first
/// control event of every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Agent system prompt
    pub instructions: Option<String>,
    pub voice: Option<String>,
    pub turn_detection: TurnDetectionConfig,
    /// Tools enabled for the agent
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<String>,
    /// Caller-side transcription; without it there is no caller transcript
    pub input_audio_transcription: Option<InputTranscriptionConfig>,
    pub temperature: Option<f32>,
    pub modalities: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            instructions: None,
            voice: None,
            turn_detection: TurnDetectionConfig::default(),
            tools: Vec::new(),
            tool_choice: Some("auto".to_string()),
            input_audio_transcription: Some(InputTranscriptionConfig::default()),
            temperature: None,
            modalities: vec!["text".to_string(), "audio".to_string()],
        }
    }
}

/// Everything needed to open one call's upstream channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub api_key: String,
    /// Provider name resolved by [`super::create_realtime_provider`]
    pub provider: String,
    /// Data channel endpoint
    pub url: String,
    pub model: String,
    pub credential_mode: CredentialMode,
    /// Ephemeral session endpoint, when `credential_mode` is ephemeral
    pub credential_url: Option<String>,
    /// Wire names of events and control messages
    pub event_names: EventNames,
    /// Upstream error types or codes that end the call
    pub fatal_error_types: Vec<String>,
    pub session: SessionSettings,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            provider: "openai".to_string(),
            url: super::openai::OPENAI_REALTIME_URL.to_string(),
            model: super::openai::OPENAI_DEFAULT_MODEL.to_string(),
            credential_mode: CredentialMode::default(),
            credential_url: None,
            event_names: EventNames::default(),
            fatal_error_types: default_fatal_error_types(),
            session: SessionSettings::default(),
        }
    }
}

/// Error types that end a call unless configured otherwise.
pub fn default_fatal_error_types() -> Vec<String> {
    ["server_error", "session_expired", "invalid_api_key"]
        .map(String::from)
        .to_vec()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTranscriptionConfig {
    pub model: String,
}

impl Default for InputTranscriptionConfig {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
        }
    }
}

/// Upstream end-of-turn detection, as configured per agent.
///
/// `None` turns upstream detection off; the local barge-in controller then
/// becomes a pass-through as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Silence based
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(default)]
        threshold: Option<f32>,
        #[serde(default)]
        prefix_padding_ms: Option<u32>,
        #[serde(default)]
        silence_duration_ms: Option<u32>,
    },
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        #[serde(default)]
        eagerness: Option<String>,
    },
    #[serde(rename = "none")]
    None,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
        }
    }
}

/// A tool the model may call, in the function-calling schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "function_tool_type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

fn function_tool_type() -> String {
    "function".to_string()
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: Option<serde_json::Value>,
    ) -> Self {
        Self {
            tool_type: function_tool_type(),
            function: FunctionDefinition {
                name: name.into(),
                description,
                parameters,
            },
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Capability interface the session drives an upstream provider through.
///
/// `connect` performs any credential exchange, opens the data channel and
/// hands back the event stream. Events arrive in upstream order and the
/// stream ends when the channel closes. Control events travel on a priority
/// lane ahead of queued audio.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Open the data channel and return its event stream.
    async fn connect(&mut self) -> RealtimeResult<mpsc::Receiver<ModelEvent>>;

    /// Close the data channel. Safe to call more than once.
    async fn disconnect(&mut self) -> RealtimeResult<()>;

    fn is_ready(&self) -> bool;

    /// Queue upstream-format PCM16 audio.
    ///
    /// Audio is dropped rather than buffered without bound if the channel
    /// falls behind.
    async fn send_audio(&mut self, audio_data: Bytes) -> RealtimeResult<()>;

    /// Send a control event on the priority lane.
    async fn send_control(&mut self, event: ControlEvent) -> RealtimeResult<()>;

    /// Abort the in-flight response.
    async fn cancel_response(&mut self) -> RealtimeResult<()> {
        self.send_control(ControlEvent::ResponseCancel).await
    }
}

pub type BoxedRealtime = Box<dyn BaseRealtime>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RealtimeConfig::default();
        assert!(config.api_key.is_empty());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.credential_mode, CredentialMode::StaticApiKey);
        assert!(config.fatal_error_types.contains(&"server_error".to_string()));
    }

    #[test]
    fn test_default_session_settings() {
        let settings = SessionSettings::default();
        assert_eq!(settings.tool_choice.as_deref(), Some("auto"));
        assert_eq!(
            settings.input_audio_transcription,
            Some(InputTranscriptionConfig {
                model: "whisper-1".to_string()
            })
        );
        assert!(matches!(
            settings.turn_detection,
            TurnDetectionConfig::ServerVad {
                silence_duration_ms: Some(500),
                ..
            }
        ));
    }

    #[test]
    fn test_turn_detection_serde_tag() {
        let json = serde_json::to_value(TurnDetectionConfig::SemanticVad {
            eagerness: Some("high".to_string()),
        })
        .unwrap();
        assert_eq!(json["type"], "semantic_vad");

        let none: TurnDetectionConfig = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(none, TurnDetectionConfig::None);
    }

    #[test]
    fn test_tool_definition_defaults_type() {
        let tool: ToolDefinition =
            serde_json::from_str(r#"{"function":{"name":"lookup_contact"}}"#).unwrap();
        assert_eq!(tool.tool_type, "function");
        assert_eq!(tool.name(), "lookup_contact");
    }
}
