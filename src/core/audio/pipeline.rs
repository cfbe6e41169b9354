//! Uplink and downlink audio paths.
//!
//! Uplink: local wire frame -> decode -> resample -> upstream PCM chunk.
//! Downlink: upstream PCM chunk -> resample -> fixed-size local frames.
//!
//! Neither path buffers more than a few frames.

use bytes::Bytes;

use super::codec::{FrameCodec, pcm16le_to_samples, samples_to_pcm16le};
use super::frame::{AudioFormat, AudioFrame, AudioResult, SequenceCounter};
use super::resample::StreamResampler;

/// Upper bound on audio held inside the pipeline, in frames.
const MAX_BUFFERED_FRAMES: usize = 4;

// =============================================================================
// Frame assembler
// =============================================================================

/// Slices a stream of samples into fixed-size frames.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_samples: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    pub fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples,
            pending: Vec::with_capacity(frame_samples * MAX_BUFFERED_FRAMES),
        }
    }

    /// Append samples and return every complete frame.
    ///
    /// The remainder kept for the next call is always shorter than one frame.
    pub fn push(&mut self, samples: &[i16]) -> Vec<Vec<i16>> {
        self.pending.extend_from_slice(samples);
        let complete = self.pending.len() / self.frame_samples;
        if complete == 0 {
            return Vec::new();
        }
        let mut frames = Vec::with_capacity(complete);
        let mut rest = self.pending.split_off(complete * self.frame_samples);
        std::mem::swap(&mut rest, &mut self.pending);
        for chunk in rest.chunks_exact(self.frame_samples) {
            frames.push(chunk.to_vec());
        }
        frames
    }

    /// Emit the remainder padded with silence, if any.
    pub fn flush(&mut self) -> Option<Vec<i16>> {
        if self.pending.is_empty() {
            return None;
        }
        let mut frame = std::mem::take(&mut self.pending);
        frame.resize(self.frame_samples, 0);
        Some(frame)
    }

    /// Discard the remainder.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }
}

// =============================================================================
// Uplink
// =============================================================================

/// Local caller audio to upstream.
#[derive(Debug)]
pub struct Uplink {
    codec: FrameCodec,
    resampler: StreamResampler,
    sequence: SequenceCounter,
}

impl Uplink {
    /// Validate and decode one local wire frame.
    pub fn decode(&mut self, wire: &[u8]) -> AudioResult<AudioFrame> {
        let frame = self.codec.decode(wire, self.sequence.count())?;
        self.sequence.next();
        Ok(frame)
    }

    /// Convert a decoded local frame to an upstream PCM chunk.
    pub fn to_upstream(&mut self, frame: &AudioFrame) -> Bytes {
        let samples = self.resampler.process(frame.samples());
        samples_to_pcm16le(&samples)
    }

    #[cfg(test)]
    fn frames_decoded(&self) -> u64 {
        self.sequence.count()
    }
}

// =============================================================================
// Downlink
// =============================================================================

/// Upstream agent audio to local playback frames.
#[derive(Debug)]
pub struct Downlink {
    codec: FrameCodec,
    resampler: StreamResampler,
    assembler: FrameAssembler,
    sequence: SequenceCounter,
}

impl Downlink {
    /// Convert one upstream PCM chunk to zero or more local wire frames.
    pub fn push(&mut self, pcm: &[u8]) -> AudioResult<Vec<Bytes>> {
        let samples = pcm16le_to_samples(pcm)?;
        let resampled = self.resampler.process(&samples);
        self.assembler
            .push(&resampled)
            .into_iter()
            .map(|samples| self.encode(samples))
            .collect()
    }

    /// Emit any partial frame at the end of a response.
    pub fn flush(&mut self) -> AudioResult<Option<Bytes>> {
        match self.assembler.flush() {
            Some(samples) => self.encode(samples).map(Some),
            None => Ok(None),
        }
    }

    /// Drop buffered agent audio after a barge-in.
    pub fn clear(&mut self) {
        self.assembler.clear();
        self.resampler.reset();
    }

    #[cfg(test)]
    fn frames_encoded(&self) -> u64 {
        self.sequence.count()
    }

    fn encode(&mut self, samples: Vec<i16>) -> AudioResult<Bytes> {
        let frame = AudioFrame::new(samples, self.sequence.next());
        self.codec.encode(&frame)
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Both directions of audio conversion for one session.
#[derive(Debug)]
pub struct AudioPipeline {
    pub uplink: Uplink,
    pub downlink: Downlink,
}

impl AudioPipeline {
    /// Build the pipeline, validating both formats once.
    pub fn new(local: AudioFormat, upstream: AudioFormat, frame_ms: u32) -> AudioResult<Self> {
        upstream.validate()?;
        let local_codec = FrameCodec::new(local, frame_ms)?;
        let frame_samples = local_codec.samples_per_frame();

        Ok(Self {
            uplink: Uplink {
                codec: local_codec.clone(),
                resampler: StreamResampler::new(local.sample_rate, upstream.sample_rate),
                sequence: SequenceCounter::default(),
            },
            downlink: Downlink {
                codec: local_codec,
                resampler: StreamResampler::new(upstream.sample_rate, local.sample_rate),
                assembler: FrameAssembler::new(frame_samples),
                sequence: SequenceCounter::default(),
            },
        })
    }
}
