//! OpenAI Realtime API WebSocket message types.
//!
//! Payload shapes follow the OpenAI Realtime protocol; event type strings
//! come from [`EventNames`] so the same codec serves renamed API revisions.
//!
//! Client events used by the bridge:
//! - session.update - Configure the session
//! - input_audio_buffer.append - Append caller audio
//! - conversation.item.create - Add a function_call_output item
//! - response.create - Continue generation
//! - response.cancel - Abort the in-flight response
//!
//! Server events consumed:
//! - session.created / session.updated
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.delta / completed
//! - response.audio.delta / response.audio.done
//! - response.audio_transcript.delta / done
//! - response.output_item.added (function name tracking)
//! - response.function_call_arguments.done
//! - response.done
//! - error

use std::collections::HashMap;

use base64::prelude::*;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::config::PCM16_AUDIO_FORMAT;
use crate::core::realtime::base::{
    RealtimeError, RealtimeResult, SessionSettings, TurnDetectionConfig,
};
use crate::core::realtime::events::{
    ControlEvent, EventNames, InboundKind, ModelEvent, ResponseStatus,
};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modalities: Vec<String>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    pub input_audio_format: String,

    /// Output audio format
    pub output_audio_format: String,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration; `null` disables it
    pub turn_detection: Option<TurnDetection>,

    /// Tool definitions
    #[serde(default)]
    pub tools: Vec<ToolDef>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Temperature for response generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl SessionConfig {
    /// Translate provider-neutral settings into the OpenAI session shape.
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            modalities: settings.modalities.clone(),
            instructions: settings.instructions.clone(),
            voice: settings.voice.clone(),
            input_audio_format: PCM16_AUDIO_FORMAT.to_string(),
            output_audio_format: PCM16_AUDIO_FORMAT.to_string(),
            input_audio_transcription: settings.input_audio_transcription.as_ref().map(|t| {
                InputAudioTranscription {
                    model: t.model.clone(),
                }
            }),
            turn_detection: match &settings.turn_detection {
                TurnDetectionConfig::ServerVad {
                    threshold,
                    prefix_padding_ms,
                    silence_duration_ms,
                } => Some(TurnDetection::ServerVad {
                    threshold: *threshold,
                    prefix_padding_ms: *prefix_padding_ms,
                    silence_duration_ms: *silence_duration_ms,
                }),
                TurnDetectionConfig::SemanticVad { eagerness } => Some(TurnDetection::SemanticVad {
                    eagerness: eagerness.clone(),
                }),
                TurnDetectionConfig::None => None,
            },
            tools: settings
                .tools
                .iter()
                .map(|t| ToolDef {
                    tool_type: t.tool_type.clone(),
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    parameters: t.function.parameters.clone(),
                })
                .collect(),
            tool_choice: settings.tool_choice.clone(),
            temperature: settings.temperature,
        }
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Semantic VAD
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

/// Tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Function parameters JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item as sent with conversation.item.create.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationItem {
    /// Item type
    #[serde(rename = "type")]
    pub item_type: String,
    /// Call ID for function call output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function output for function call result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    pub fn function_call_output(call_id: &str, output: &str) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.to_string()),
            output: Some(output.to_string()),
        }
    }
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

#[derive(Serialize)]
struct Outbound<'a, T: Serialize> {
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct SessionUpdateBody {
    session: SessionConfig,
}

#[derive(Serialize)]
struct AudioAppendBody {
    audio: String,
}

#[derive(Serialize)]
struct ItemCreateBody {
    item: ConversationItem,
}

#[derive(Serialize)]
struct EmptyBody {}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Message used when an error event arrives without a readable body.
pub const MALFORMED_ERROR_MESSAGE: &str = "malformed upstream error event";

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    session: SessionInfo,
}

#[derive(Debug, Deserialize)]
struct SpeechStartedPayload {
    #[serde(default)]
    audio_start_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    delta: String,
    #[serde(default)]
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptPayload {
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    call_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputItemAddedPayload {
    item: OutputItem,
}

#[derive(Debug, Deserialize)]
struct FunctionCallArgumentsDonePayload {
    call_id: String,
    #[serde(default)]
    arguments: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ResponseDonePayload {
    response: ResponseInfo,
}

// =============================================================================
// Protocol codec
// =============================================================================

/// Stateful encoder/decoder for one OpenAI Realtime connection.
///
/// The only state is the call_id -> function name map: the arguments-done
/// event does not always carry the function name, so it is taken from the
/// preceding output-item-added event.
#[derive(Debug)]
pub struct OpenAIProtocol {
    names: EventNames,
    fatal_error_types: Vec<String>,
    pending_function_calls: HashMap<String, String>,
}

impl OpenAIProtocol {
    pub fn new(names: EventNames, fatal_error_types: Vec<String>) -> Self {
        Self {
            names,
            fatal_error_types,
            pending_function_calls: HashMap::new(),
        }
    }

    pub fn names(&self) -> &EventNames {
        &self.names
    }

    /// Encode a control event as a JSON text frame.
    pub fn encode_control(&self, event: &ControlEvent) -> RealtimeResult<String> {
        let json = match event {
            ControlEvent::SessionUpdate(settings) => serde_json::to_string(&Outbound {
                event_type: &self.names.session_update,
                body: SessionUpdateBody {
                    session: SessionConfig::from_settings(settings),
                },
            }),
            ControlEvent::FunctionCallOutput { call_id, output } => {
                serde_json::to_string(&Outbound {
                    event_type: &self.names.conversation_item_create,
                    body: ItemCreateBody {
                        item: ConversationItem::function_call_output(call_id, output),
                    },
                })
            }
            ControlEvent::ResponseCreate => serde_json::to_string(&Outbound {
                event_type: &self.names.response_create,
                body: EmptyBody {},
            }),
            ControlEvent::ResponseCancel => serde_json::to_string(&Outbound {
                event_type: &self.names.response_cancel,
                body: EmptyBody {},
            }),
        };
        json.map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }

    /// Encode a PCM16 chunk as an audio append event.
    pub fn encode_audio(&self, audio: &[u8]) -> RealtimeResult<String> {
        serde_json::to_string(&Outbound {
            event_type: &self.names.input_audio_append,
            body: AudioAppendBody {
                audio: BASE64_STANDARD.encode(audio),
            },
        })
        .map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }

    /// Decode one text frame.
    ///
    /// `Ok(None)` means the event is valid but not interesting to the bridge.
    pub fn decode(&mut self, text: &str) -> RealtimeResult<Option<ModelEvent>> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RealtimeError::MalformedEvent(format!("invalid JSON: {e}")))?;
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RealtimeError::MalformedEvent("missing event type".to_string()))?
            .to_string();

        let Some(kind) = self.names.classify(&event_type) else {
            trace!(event_type, "Ignoring upstream event");
            return Ok(None);
        };

        let event = match kind {
            InboundKind::Error => {
                let error = match payload::<ErrorPayload>(value, &event_type) {
                    Ok(ErrorPayload { error }) => error,
                    Err(e) => {
                        // Still an error signal; judge it without a type or code
                        warn!(event_type, error = %e, "Unreadable upstream error payload");
                        ApiError {
                            error_type: String::new(),
                            code: None,
                            message: MALFORMED_ERROR_MESSAGE.to_string(),
                        }
                    }
                };
                let fatal = self.is_fatal(&error);
                Some(ModelEvent::Error {
                    code: error.code.or(Some(error.error_type).filter(|t| !t.is_empty())),
                    message: error.message,
                    fatal,
                })
            }
            InboundKind::SessionCreated => {
                let SessionPayload { session } = payload(value, &event_type)?;
                Some(ModelEvent::SessionCreated {
                    session_id: session.id,
                })
            }
            InboundKind::SessionUpdated => Some(ModelEvent::SessionReady),
            InboundKind::SpeechStarted => {
                let SpeechStartedPayload { audio_start_ms } = payload(value, &event_type)?;
                Some(ModelEvent::SpeechStarted { audio_start_ms })
            }
            InboundKind::SpeechStopped => Some(ModelEvent::SpeechStopped),
            InboundKind::InputTranscriptDelta => {
                let DeltaPayload { delta, .. } = payload(value, &event_type)?;
                Some(ModelEvent::InputTranscript {
                    text: delta,
                    is_final: false,
                })
            }
            InboundKind::InputTranscriptCompleted => {
                let TranscriptPayload { transcript } = payload(value, &event_type)?;
                Some(ModelEvent::InputTranscript {
                    text: transcript,
                    is_final: true,
                })
            }
            InboundKind::OutputAudioDelta => {
                let DeltaPayload { delta, response_id } = payload(value, &event_type)?;
                let audio = BASE64_STANDARD.decode(delta.as_bytes()).map_err(|e| {
                    RealtimeError::MalformedEvent(format!("invalid base64 audio: {e}"))
                })?;
                Some(ModelEvent::OutputAudio {
                    audio: Bytes::from(audio),
                    response_id,
                })
            }
            InboundKind::OutputAudioDone => Some(ModelEvent::OutputAudioDone),
            InboundKind::OutputTranscriptDelta => {
                let DeltaPayload { delta, .. } = payload(value, &event_type)?;
                Some(ModelEvent::OutputTranscript {
                    text: delta,
                    is_final: false,
                })
            }
            InboundKind::OutputTranscriptDone => {
                let TranscriptPayload { transcript } = payload(value, &event_type)?;
                Some(ModelEvent::OutputTranscript {
                    text: transcript,
                    is_final: true,
                })
            }
            InboundKind::OutputItemAdded => {
                let OutputItemAddedPayload { item } = payload(value, &event_type)?;
                if item.item_type == "function_call"
                    && let (Some(call_id), Some(name)) = (item.call_id, item.name)
                {
                    debug!(%call_id, %name, "Tracking function call");
                    self.pending_function_calls.insert(call_id, name);
                }
                None
            }
            InboundKind::FunctionCallArgumentsDone => {
                let done: FunctionCallArgumentsDonePayload = payload(value, &event_type)?;
                let tracked = self.pending_function_calls.remove(&done.call_id);
                let tool_name = match done.name.or(tracked) {
                    Some(name) => name,
                    None => {
                        warn!(
                            call_id = %done.call_id,
                            "Function name not found for call_id, forwarding with empty name"
                        );
                        String::new()
                    }
                };
                Some(ModelEvent::FunctionCallRequest {
                    call_id: done.call_id,
                    tool_name,
                    arguments: done.arguments,
                })
            }
            InboundKind::ResponseDone => {
                let ResponseDonePayload { response } = payload(value, &event_type)?;
                Some(ModelEvent::ResponseComplete {
                    response_id: response.id,
                    status: ResponseStatus::parse(&response.status),
                })
            }
        };
        Ok(event)
    }

    /// Forget per-connection state.
    pub fn reset(&mut self) {
        self.pending_function_calls.clear();
    }

    fn is_fatal(&self, error: &ApiError) -> bool {
        self.fatal_error_types.iter().any(|fatal| {
            *fatal == error.error_type || error.code.as_deref() == Some(fatal.as_str())
        })
    }
}

fn payload<T: DeserializeOwned>(value: Value, event_type: &str) -> RealtimeResult<T> {
    serde_json::from_value(value)
        .map_err(|e| RealtimeError::MalformedEvent(format!("{event_type}: {e}")))
}

// =============================================================================
// Tests
// =============================================================================
