//! Transcript assembly.
//!
//! Upstream speech-to-text and text-to-speech fragments arrive token by
//! token. The [`TranscriptAggregator`] coalesces them into a bounded-rate,
//! ordered, deduplicated log of [`TranscriptEntry`] values.

mod aggregator;

pub use aggregator::{DEFAULT_COALESCE_WINDOW, TranscriptAggregator};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Agent,
    System,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::Caller => write!(f, "caller"),
            Speaker::Agent => write!(f, "agent"),
            Speaker::System => write!(f, "system"),
        }
    }
}

/// Whether a fragment is a streaming partial or the complete utterance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Incremental text to append
    Delta,
    /// Full text of the utterance; only the part not already streamed is new
    Final,
}

/// A piece of transcript text as delivered by the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFragment {
    pub speaker: Speaker,
    pub text: String,
    pub kind: FragmentKind,
}

impl TranscriptFragment {
    pub fn delta(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            kind: FragmentKind::Delta,
        }
    }

    pub fn final_text(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            kind: FragmentKind::Final,
        }
    }
}

/// One finalized line of the call transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization() {
        let entry = TranscriptEntry {
            speaker: Speaker::Agent,
            text: "Hello".to_string(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["speaker"], "agent");
        assert_eq!(json["text"], "Hello");
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");

        let back: TranscriptEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_speaker_display() {
        assert_eq!(Speaker::Caller.to_string(), "caller");
        assert_eq!(Speaker::System.to_string(), "system");
    }
}
