//! Provider-neutral upstream events.
//!
//! Event type names differ between providers and API revisions, so every
//! inbound and outbound type string lives in [`EventNames`] and can be
//! overridden from configuration.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::base::SessionSettings;

// =============================================================================
// Event names
// =============================================================================

/// Wire type names for upstream events. Defaults are the OpenAI Realtime names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventNames {
    // Inbound
    pub error: String,
    pub session_created: String,
    pub session_updated: String,
    pub speech_started: String,
    pub speech_stopped: String,
    pub input_transcript_delta: String,
    pub input_transcript_completed: String,
    pub output_audio_delta: String,
    pub output_audio_done: String,
    pub output_transcript_delta: String,
    pub output_transcript_done: String,
    pub output_item_added: String,
    pub function_call_arguments_done: String,
    pub response_done: String,

    // Outbound
    pub session_update: String,
    pub input_audio_append: String,
    pub conversation_item_create: String,
    pub response_create: String,
    pub response_cancel: String,
}

impl Default for EventNames {
    fn default() -> Self {
        Self {
            error: "error".to_string(),
            session_created: "session.created".to_string(),
            session_updated: "session.updated".to_string(),
            speech_started: "input_audio_buffer.speech_started".to_string(),
            speech_stopped: "input_audio_buffer.speech_stopped".to_string(),
            input_transcript_delta: "conversation.item.input_audio_transcription.delta"
                .to_string(),
            input_transcript_completed: "conversation.item.input_audio_transcription.completed"
                .to_string(),
            output_audio_delta: "response.audio.delta".to_string(),
            output_audio_done: "response.audio.done".to_string(),
            output_transcript_delta: "response.audio_transcript.delta".to_string(),
            output_transcript_done: "response.audio_transcript.done".to_string(),
            output_item_added: "response.output_item.added".to_string(),
            function_call_arguments_done: "response.function_call_arguments.done".to_string(),
            response_done: "response.done".to_string(),
            session_update: "session.update".to_string(),
            input_audio_append: "input_audio_buffer.append".to_string(),
            conversation_item_create: "conversation.item.create".to_string(),
            response_create: "response.create".to_string(),
            response_cancel: "response.cancel".to_string(),
        }
    }
}

/// Inbound event kinds the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    Error,
    SessionCreated,
    SessionUpdated,
    SpeechStarted,
    SpeechStopped,
    InputTranscriptDelta,
    InputTranscriptCompleted,
    OutputAudioDelta,
    OutputAudioDone,
    OutputTranscriptDelta,
    OutputTranscriptDone,
    OutputItemAdded,
    FunctionCallArgumentsDone,
    ResponseDone,
}

impl EventNames {
    fn inbound(&self) -> [(&str, InboundKind); 14] {
        [
            (self.error.as_str(), InboundKind::Error),
            (self.session_created.as_str(), InboundKind::SessionCreated),
            (self.session_updated.as_str(), InboundKind::SessionUpdated),
            (self.speech_started.as_str(), InboundKind::SpeechStarted),
            (self.speech_stopped.as_str(), InboundKind::SpeechStopped),
            (self.input_transcript_delta.as_str(), InboundKind::InputTranscriptDelta),
            (
                self.input_transcript_completed.as_str(),
                InboundKind::InputTranscriptCompleted,
            ),
            (self.output_audio_delta.as_str(), InboundKind::OutputAudioDelta),
            (self.output_audio_done.as_str(), InboundKind::OutputAudioDone),
            (self.output_transcript_delta.as_str(), InboundKind::OutputTranscriptDelta),
            (self.output_transcript_done.as_str(), InboundKind::OutputTranscriptDone),
            (self.output_item_added.as_str(), InboundKind::OutputItemAdded),
            (
                self.function_call_arguments_done.as_str(),
                InboundKind::FunctionCallArgumentsDone,
            ),
            (self.response_done.as_str(), InboundKind::ResponseDone),
        ]
    }

    fn outbound(&self) -> [&str; 5] {
        [
            self.session_update.as_str(),
            self.input_audio_append.as_str(),
            self.conversation_item_create.as_str(),
            self.response_create.as_str(),
            self.response_cancel.as_str(),
        ]
    }

    /// Map a wire type to the event it represents. Unknown types yield `None`
    /// and are ignored by the decoder.
    pub fn classify(&self, event_type: &str) -> Option<InboundKind> {
        self.inbound()
            .into_iter()
            .find(|(name, _)| *name == event_type)
            .map(|(_, kind)| kind)
    }

    /// Reject empty names and ambiguous inbound names.
    pub fn validate(&self) -> Result<(), String> {
        let inbound = self.inbound();
        for (name, kind) in &inbound {
            if name.is_empty() {
                return Err(format!("event name for {kind:?} is empty"));
            }
        }
        for (i, (name, _)) in inbound.iter().enumerate() {
            if inbound[i + 1..].iter().any(|(other, _)| other == name) {
                return Err(format!("inbound event name '{name}' is used twice"));
            }
        }
        if self.outbound().iter().any(|name| name.is_empty()) {
            return Err("outbound control names must not be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Model events
// =============================================================================

/// How a response ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    Completed,
    Cancelled,
    Incomplete,
    Failed,
    Other(String),
}

impl ResponseStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "incomplete" => Self::Incomplete,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An event received from the upstream model channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Upstream session allocated
    SessionCreated { session_id: String },
    /// Session configuration acknowledged
    SessionReady,
    /// Caller speech detected upstream (barge-in signal)
    SpeechStarted { audio_start_ms: Option<u64> },
    /// Caller speech ended
    SpeechStopped,
    /// Caller transcript fragment
    InputTranscript { text: String, is_final: bool },
    /// Agent audio, upstream-format PCM16
    OutputAudio {
        audio: Bytes,
        response_id: Option<String>,
    },
    /// Agent audio for the current item is complete
    OutputAudioDone,
    /// Agent transcript fragment
    OutputTranscript { text: String, is_final: bool },
    /// The model wants a tool run
    FunctionCallRequest {
        call_id: String,
        tool_name: String,
        arguments: String,
    },
    /// Response finished; `Cancelled` acknowledges a cancellation
    ResponseComplete {
        response_id: Option<String>,
        status: ResponseStatus,
    },
    /// Explicit upstream error
    Error {
        code: Option<String>,
        message: String,
        fatal: bool,
    },
}

impl ModelEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ModelEvent::SessionCreated { .. } => "session_created",
            ModelEvent::SessionReady => "session_ready",
            ModelEvent::SpeechStarted { .. } => "speech_started",
            ModelEvent::SpeechStopped => "speech_stopped",
            ModelEvent::InputTranscript { .. } => "input_transcript",
            ModelEvent::OutputAudio { .. } => "output_audio",
            ModelEvent::OutputAudioDone => "output_audio_done",
            ModelEvent::OutputTranscript { .. } => "output_transcript",
            ModelEvent::FunctionCallRequest { .. } => "function_call_request",
            ModelEvent::ResponseComplete { .. } => "response_complete",
            ModelEvent::Error { .. } => "error",
        }
    }
}

// =============================================================================
// Control events
// =============================================================================

/// A control message sent upstream on the priority lane.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// Configure the conversation
    SessionUpdate(Box<SessionSettings>),
    /// Fold a tool result back into the conversation
    FunctionCallOutput { call_id: String, output: String },
    /// Continue generation
    ResponseCreate,
    /// Abort the in-flight response
    ResponseCancel,
}

impl ControlEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ControlEvent::SessionUpdate(_) => "session_update",
            ControlEvent::FunctionCallOutput { .. } => "function_call_output",
            ControlEvent::ResponseCreate => "response_create",
            ControlEvent::ResponseCancel => "response_cancel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_classify() {
        let names = EventNames::default();
        assert_eq!(
            names.classify("response.audio.delta"),
            Some(InboundKind::OutputAudioDelta)
        );
        assert_eq!(
            names.classify("input_audio_buffer.speech_started"),
            Some(InboundKind::SpeechStarted)
        );
        assert_eq!(names.classify("rate_limits.updated"), None);
        assert!(names.validate().is_ok());
    }

    #[test]
    fn test_renamed_events_classify() {
        let names = EventNames {
            output_audio_delta: "response.output_audio.delta".to_string(),
            ..Default::default()
        };
        assert_eq!(
            names.classify("response.output_audio.delta"),
            Some(InboundKind::OutputAudioDelta)
        );
        assert_eq!(names.classify("response.audio.delta"), None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let names: EventNames =
            serde_yaml::from_str("output_transcript_delta: response.output_audio_transcript.delta")
                .unwrap();
        assert_eq!(
            names.output_transcript_delta,
            "response.output_audio_transcript.delta"
        );
        assert_eq!(names.response_done, "response.done");
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        let duplicate = EventNames {
            speech_stopped: "input_audio_buffer.speech_started".to_string(),
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());

        let empty = EventNames {
            response_cancel: String::new(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_response_status_parse() {
        assert_eq!(ResponseStatus::parse("cancelled"), ResponseStatus::Cancelled);
        assert_eq!(ResponseStatus::parse("completed"), ResponseStatus::Completed);
        assert_eq!(
            ResponseStatus::parse("weird"),
            ResponseStatus::Other("weird".to_string())
        );
    }
}
