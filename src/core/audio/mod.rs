//! Audio codec pipeline.
//!
//! Validates and converts PCM16 audio between the local transport and the
//! upstream model, resampling when the two sides disagree on rate.

mod codec;
mod frame;
mod pipeline;
mod resample;

pub use codec::{FrameCodec, pcm16le_to_samples, samples_to_pcm16le};
pub use frame::{
    AudioError, AudioFormat, AudioFrame, AudioResult, BYTES_PER_SAMPLE, DEFAULT_FRAME_DURATION_MS,
    DEFAULT_LOCAL_SAMPLE_RATE, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE, SequenceCounter,
};
pub use pipeline::{AudioPipeline, Downlink, FrameAssembler, Uplink};
pub use resample::StreamResampler;
