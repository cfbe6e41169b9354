//! Pure conversions between wire bytes and audio frames.
//!
//! The wire format on both sides is 16-bit signed little-endian PCM, mono.
//! `FrameCodec` validates frame sizes against the format fixed at connect
//! time; anything else is rejected as `MalformedAudio`.

use bytes::{BufMut, Bytes, BytesMut};

use super::frame::{AudioError, AudioFormat, AudioFrame, AudioResult, BYTES_PER_SAMPLE};

/// One scale for both directions keeps the float mapping symmetric around zero.
const PCM_FLOAT_SCALE: f32 = i16::MAX as f32;

#[inline]
pub fn sample_to_f32(sample: i16) -> f32 {
    sample as f32 / PCM_FLOAT_SCALE
}

/// Back to PCM16, saturating at `[-1.0, 1.0]` instead of wrapping.
#[inline]
pub fn f32_to_sample(value: f32) -> i16 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * PCM_FLOAT_SCALE).round() as i16
}

/// Parse little-endian PCM16 bytes into samples.
pub fn pcm16le_to_samples(bytes: &[u8]) -> AudioResult<Vec<i16>> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(AudioError::MalformedAudio(format!(
            "odd PCM16 payload length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Serialize samples as little-endian PCM16.
pub fn samples_to_pcm16le(samples: &[i16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        buf.put_i16_le(*sample);
    }
    buf.freeze()
}

/// Fixed-size frame codec for one side of the bridge.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    format: AudioFormat,
    frame_ms: u32,
    samples_per_frame: usize,
}

impl FrameCodec {
    /// Build a codec, validating the format once.
    pub fn new(format: AudioFormat, frame_ms: u32) -> AudioResult<Self> {
        format.validate()?;
        let samples_per_frame = format.samples_per_frame(frame_ms);
        if samples_per_frame == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "frame duration {frame_ms}ms yields empty frames at {} Hz",
                format.sample_rate
            )));
        }
        Ok(Self {
            format,
            frame_ms,
            samples_per_frame,
        })
    }

    #[inline]
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    #[inline]
    pub fn frame_ms(&self) -> u32 {
        self.frame_ms
    }

    #[inline]
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Size in bytes of one wire frame.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame * BYTES_PER_SAMPLE
    }

    /// Wire bytes to a raw frame.
    pub fn decode(&self, wire: &[u8], sequence: u64) -> AudioResult<AudioFrame> {
        if wire.len() != self.frame_bytes() {
            return Err(AudioError::MalformedAudio(format!(
                "expected {} bytes per frame, got {}",
                self.frame_bytes(),
                wire.len()
            )));
        }
        Ok(AudioFrame::new(pcm16le_to_samples(wire)?, sequence))
    }

    /// Raw frame to wire bytes.
    pub fn encode(&self, frame: &AudioFrame) -> AudioResult<Bytes> {
        if frame.sample_count() != self.samples_per_frame {
            return Err(AudioError::MalformedAudio(format!(
                "expected {} samples per frame, got {}",
                self.samples_per_frame,
                frame.sample_count()
            )));
        }
        Ok(samples_to_pcm16le(frame.samples()))
    }
}
