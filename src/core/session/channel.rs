//! Local audio channel abstraction.
//!
//! The session does not care whether the caller is a raw WebSocket, a
//! WebRTC media bridge or a test harness: it only sees [`LocalAudioChannel`].

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::transcript::TranscriptEntry;

/// Something the caller side delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalInput {
    /// One PCM16LE frame at the local sample rate
    Audio(Bytes),
    /// Local voice activity detected caller speech
    SpeechStarted,
    /// Caller ended the call
    Hangup,
}

/// Something the session sends to the caller side.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalOutput {
    /// Session is ready for audio
    Ready { session_id: String },
    /// One PCM16LE playback frame at the local sample rate
    Audio(Bytes),
    /// Newly finalized transcript entries
    Transcript(Vec<TranscriptEntry>),
    /// Discard any playback still queued
    ClearPlayback,
    /// Caller-facing status message
    Notice(String),
    /// Session is ending
    Closing { reason: String },
}

impl LocalOutput {
    pub fn name(&self) -> &'static str {
        match self {
            LocalOutput::Ready { .. } => "ready",
            LocalOutput::Audio(_) => "audio",
            LocalOutput::Transcript(_) => "transcript",
            LocalOutput::ClearPlayback => "clear_playback",
            LocalOutput::Notice(_) => "notice",
            LocalOutput::Closing { .. } => "closing",
        }
    }
}

/// The caller side went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Local audio channel closed")]
pub struct ChannelClosed;

/// Duplex channel to the caller.
///
/// `recv` must be cancel-safe: the session polls it inside `select!`.
/// Implementations should not block `send` on playback I/O for long; audio
/// may be dropped under sustained backpressure.
#[async_trait]
pub trait LocalAudioChannel: Send {
    /// Next caller input, or `None` once the caller side has closed.
    async fn recv(&mut self) -> Option<LocalInput>;

    /// Deliver output to the caller side.
    async fn send(&mut self, output: LocalOutput) -> Result<(), ChannelClosed>;

    /// Release the channel. Safe to call more than once.
    async fn close(&mut self);
}

/// Boxed trait object for local channels.
pub type BoxedLocalChannel = Box<dyn LocalAudioChannel>;

// =============================================================================
// In-memory channel
// =============================================================================

/// Channel-backed [`LocalAudioChannel`], for in-process transports and tests.
pub struct ChannelLocalAudio {
    input_rx: mpsc::Receiver<LocalInput>,
    output_tx: Option<mpsc::Sender<LocalOutput>>,
}

/// The caller end of a [`ChannelLocalAudio`].
pub struct LocalPeer {
    pub input: mpsc::Sender<LocalInput>,
    pub output: mpsc::Receiver<LocalOutput>,
}

impl ChannelLocalAudio {
    /// Create a connected channel/peer pair with bounded queues.
    pub fn pair(capacity: usize) -> (Self, LocalPeer) {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);
        (
            Self {
                input_rx,
                output_tx: Some(output_tx),
            },
            LocalPeer {
                input: input_tx,
                output: output_rx,
            },
        )
    }
}

#[async_trait]
impl LocalAudioChannel for ChannelLocalAudio {
    async fn recv(&mut self) -> Option<LocalInput> {
        if self.output_tx.is_none() {
            return None;
        }
        self.input_rx.recv().await
    }

    async fn send(&mut self, output: LocalOutput) -> Result<(), ChannelClosed> {
        let sender = self.output_tx.as_ref().ok_or(ChannelClosed)?;
        sender.send(output).await.map_err(|_| ChannelClosed)
    }

    async fn close(&mut self) {
        self.output_tx = None;
        self.input_rx.close();
    }
}
