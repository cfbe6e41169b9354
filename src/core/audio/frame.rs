//! Audio frame and format types shared by both directions of the bridge.

use std::sync::Arc;

use thiserror::Error;

/// Lowest sample rate accepted on either side of the bridge.
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest sample rate accepted on either side of the bridge.
pub const MAX_SAMPLE_RATE: u32 = 48_000;

/// Sample rate observed on browser and raw socket callers.
pub const DEFAULT_LOCAL_SAMPLE_RATE: u32 = 24_000;

/// Default frame duration for local audio.
pub const DEFAULT_FRAME_DURATION_MS: u32 = 20;

/// Bytes per PCM16 sample.
pub const BYTES_PER_SAMPLE: usize = 2;

// =============================================================================
// Errors
// =============================================================================

/// Errors produced by the audio codec pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// Frame of unexpected size or layout; the frame is dropped, the session continues
    #[error("Malformed audio: {0}")]
    MalformedAudio(String),

    /// Format rejected at session setup
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

// =============================================================================
// Format
// =============================================================================

/// Sample layout of one side of the bridge.
///
/// Only mono PCM16 is carried; the channel count is part of the type so that
/// a misconfigured transport is rejected once, at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Interleaved channel count (must be 1)
    pub channels: u16,
}

impl AudioFormat {
    /// Mono PCM16 at the given rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    /// Validate the format once per session.
    pub fn validate(&self) -> AudioResult<()> {
        if self.channels != 1 {
            return Err(AudioError::UnsupportedFormat(format!(
                "expected mono audio, got {} channels",
                self.channels
            )));
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(AudioError::UnsupportedFormat(format!(
                "sample rate {} Hz outside {}..={} Hz",
                self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        Ok(())
    }

    /// Number of samples in a frame of `frame_ms` milliseconds.
    #[inline]
    pub fn samples_per_frame(&self, frame_ms: u32) -> usize {
        (self.sample_rate as usize * frame_ms as usize) / 1000
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono(DEFAULT_LOCAL_SAMPLE_RATE)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pcm16/{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

// =============================================================================
// Frame
// =============================================================================

/// An immutable buffer of PCM16 samples.
///
/// Sequence numbers are per direction and only used for diagnostics; the
/// transports preserve order within a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Arc<[i16]>,
    sequence: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sequence: u64) -> Self {
        Self {
            samples: samples.into(),
            sequence,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Monotonic per-direction frame counter.
#[derive(Debug, Default)]
pub struct SequenceCounter(u64);

impl SequenceCounter {
    /// Return the next sequence number.
    pub fn next(&mut self) -> u64 {
        let seq = self.0;
        self.0 = self.0.wrapping_add(1);
        seq
    }

    /// Frames counted so far.
    pub fn count(&self) -> u64 {
        self.0
    }
}
