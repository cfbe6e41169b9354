//! Transcript sink: where finalized transcript entries and call metadata go.
//!
//! The bridge never persists transcripts itself; it hands them to a sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::state::SessionState;
use crate::core::transcript::TranscriptEntry;

/// Errors from delivering to a transcript sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink unreachable: {0}")]
    Transport(String),

    #[error("sink rejected request with status {0}")]
    Rejected(u16),
}

/// Call metadata emitted once per session, after the last transcript batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSummary {
    pub session_id: String,
    pub agent_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub duration_ms: u64,
    pub final_state: SessionState,
    pub close_reason: String,
    pub transcript_entries: usize,
    pub barge_ins: u64,
    pub tool_calls: u64,
}

/// Receives drained transcript entries and the final call summary.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Append newly finalized entries, in order.
    async fn append(
        &self,
        session_id: &str,
        agent_id: &str,
        entries: &[TranscriptEntry],
    ) -> Result<(), SinkError>;

    /// Record the end of a call.
    async fn session_ended(&self, summary: &CallSummary) -> Result<(), SinkError>;
}

pub type SharedTranscriptSink = Arc<dyn TranscriptSink>;

// =============================================================================
// Tracing sink
// =============================================================================

/// Writes transcripts to the log. Used when no sink URL is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl TranscriptSink for TracingSink {
    async fn append(
        &self,
        session_id: &str,
        agent_id: &str,
        entries: &[TranscriptEntry],
    ) -> Result<(), SinkError> {
        for entry in entries {
            info!(
                session_id,
                agent_id,
                speaker = %entry.speaker,
                text = %entry.text,
                "transcript"
            );
        }
        Ok(())
    }

    async fn session_ended(&self, summary: &CallSummary) -> Result<(), SinkError> {
        info!(
            session_id = %summary.session_id,
            agent_id = %summary.agent_id,
            duration_ms = summary.duration_ms,
            final_state = %summary.final_state,
            reason = %summary.close_reason,
            entries = summary.transcript_entries,
            barge_ins = summary.barge_ins,
            tool_calls = summary.tool_calls,
            "Call ended"
        );
        Ok(())
    }
}

// =============================================================================
// HTTP sink
// =============================================================================

#[derive(Serialize)]
struct AppendRequest<'a> {
    agent_id: &'a str,
    entries: &'a [TranscriptEntry],
}

/// POSTs transcripts and summaries to the CRUD layer.
///
/// - `POST {base}/api/v1/calls/{session_id}/transcript`
/// - `POST {base}/api/v1/calls/{session_id}/summary`
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSink {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| SinkError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<T: Serialize + Sync>(&self, url: String, body: &T) -> Result<(), SinkError> {
        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status.as_u16()));
        }
        debug!(url, "Delivered to transcript sink");
        Ok(())
    }
}

#[async_trait]
impl TranscriptSink for HttpSink {
    async fn append(
        &self,
        session_id: &str,
        agent_id: &str,
        entries: &[TranscriptEntry],
    ) -> Result<(), SinkError> {
        let url = format!("{}/api/v1/calls/{}/transcript", self.base_url, session_id);
        self.post(url, &AppendRequest { agent_id, entries }).await
    }

    async fn session_ended(&self, summary: &CallSummary) -> Result<(), SinkError> {
        let url = format!("{}/api/v1/calls/{}/summary", self.base_url, summary.session_id);
        self.post(url, summary).await
    }
}

// =============================================================================
// Memory sink
// =============================================================================

/// Keeps everything in memory; for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<TranscriptEntry>>,
    summaries: Mutex<Vec<CallSummary>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().clone()
    }

    pub fn summaries(&self) -> Vec<CallSummary> {
        self.summaries.lock().clone()
    }
}

#[async_trait]
impl TranscriptSink for MemorySink {
    async fn append(
        &self,
        _session_id: &str,
        _agent_id: &str,
        entries: &[TranscriptEntry],
    ) -> Result<(), SinkError> {
        self.entries.lock().extend_from_slice(entries);
        Ok(())
    }

    async fn session_ended(&self, summary: &CallSummary) -> Result<(), SinkError> {
        self.summaries.lock().push(summary.clone());
        Ok(())
    }
}
