//! Fragment coalescing for one call's transcript.

use std::collections::HashMap;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::debug;

use super::{FragmentKind, Speaker, TranscriptEntry, TranscriptFragment};

/// Default coalescing window for rapid-fire partials.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(40);

#[derive(Debug)]
struct Pending {
    speaker: Speaker,
    text: String,
    opened_at: Instant,
    timestamp: OffsetDateTime,
}

/// Coalesces transcript fragments into finalized entries.
///
/// Only one speaker can have a pending buffer at a time. The buffer is
/// finalized when its window expires, when another speaker's fragment arrives,
/// when a final fragment closes the utterance, or on [`flush`](Self::flush).
#[derive(Debug)]
pub struct TranscriptAggregator {
    window: Duration,
    pending: Option<Pending>,
    /// Text already received as deltas for each speaker's open utterance
    streamed: HashMap<Speaker, String>,
    /// Finalized but not yet drained
    ready: Vec<TranscriptEntry>,
    last_finalized: Option<(Speaker, String)>,
}

impl TranscriptAggregator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            streamed: HashMap::new(),
            ready: Vec::new(),
            last_finalized: None,
        }
    }

    /// Append or merge a fragment.
    pub fn ingest(&mut self, fragment: TranscriptFragment, now: Instant) {
        self.expire(now);

        match fragment.kind {
            FragmentKind::Delta => {
                if fragment.text.is_empty() {
                    return;
                }
                self.streamed
                    .entry(fragment.speaker)
                    .or_default()
                    .push_str(&fragment.text);
                self.append(fragment.speaker, &fragment.text, now);
            }
            FragmentKind::Final => {
                let streamed = self.streamed.remove(&fragment.speaker).unwrap_or_default();
                let remainder = if streamed.is_empty() {
                    fragment.text.as_str()
                } else if let Some(rest) = fragment.text.strip_prefix(streamed.as_str()) {
                    rest
                } else {
                    debug!(
                        speaker = %fragment.speaker,
                        "Final transcript differs from streamed text, keeping streamed version"
                    );
                    ""
                };
                if !remainder.is_empty() {
                    self.append(fragment.speaker, remainder, now);
                }
                if self
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.speaker == fragment.speaker)
                {
                    self.finalize_pending();
                }
            }
        }
    }

    /// Record a system message, e.g. a surfaced protocol error.
    pub fn push_system(&mut self, text: impl Into<String>) {
        self.finalize_pending();
        self.finalize(Speaker::System, text.into(), OffsetDateTime::now_utc());
    }

    /// Finalize the pending buffer if its window has elapsed.
    pub fn expire(&mut self, now: Instant) {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| now.duration_since(p.opened_at) >= self.window)
        {
            self.finalize_pending();
        }
    }

    /// When the pending buffer's window elapses, if there is one.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.opened_at + self.window)
    }

    /// Entries finalized since the previous drain, in order.
    pub fn drain(&mut self) -> Vec<TranscriptEntry> {
        std::mem::take(&mut self.ready)
    }

    /// Finalize everything still buffered. Used on teardown.
    pub fn flush(&mut self) {
        self.finalize_pending();
        self.streamed.clear();
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn append(&mut self, speaker: Speaker, text: &str, now: Instant) {
        if self.pending.as_ref().is_some_and(|p| p.speaker != speaker) {
            self.finalize_pending();
        }
        match self.pending.as_mut() {
            Some(pending) => pending.text.push_str(text),
            None => {
                self.pending = Some(Pending {
                    speaker,
                    text: text.to_string(),
                    opened_at: now,
                    timestamp: OffsetDateTime::now_utc(),
                });
            }
        }
    }

    fn finalize_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.finalize(pending.speaker, pending.text, pending.timestamp);
        }
    }

    fn finalize(&mut self, speaker: Speaker, text: String, timestamp: OffsetDateTime) {
        if text.trim().is_empty() {
            return;
        }
        if self
            .last_finalized
            .as_ref()
            .is_some_and(|(s, t)| *s == speaker && *t == text)
        {
            debug!(%speaker, "Dropping duplicate transcript entry");
            return;
        }
        self.last_finalized = Some((speaker, text.clone()));
        self.ready.push(TranscriptEntry {
            speaker,
            text,
            timestamp,
        });
    }
}

impl Default for TranscriptAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_COALESCE_WINDOW)
    }
}
