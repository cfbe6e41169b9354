//! Streaming linear resampler.
//!
//! Keeps one sample and a fractional read position between calls, so the
//! latency it adds is bounded by a single input sample regardless of how the
//! stream is chunked.

use super::codec::{f32_to_sample, sample_to_f32};

/// Linear interpolation resampler for mono PCM16 streams.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    from_rate: u32,
    to_rate: u32,
    /// Input samples advanced per output sample
    step: f64,
    /// Next output position in input-sample units, relative to the start of
    /// the next chunk. `-1.0 <= position` always holds between calls.
    position: f64,
    /// Last input sample of the previous chunk
    previous: Option<i16>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            step: from_rate as f64 / to_rate as f64,
            position: 0.0,
            previous: None,
        }
    }

    /// Whether this resampler changes the rate at all.
    #[inline]
    pub fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    /// Resample the next chunk of the stream.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        if input.is_empty() {
            return Vec::new();
        }

        let estimated = (input.len() as f64 / self.step).ceil() as usize + 1;
        let mut output = Vec::with_capacity(estimated);
        let len = input.len() as isize;
        let mut position = self.position;

        loop {
            let index = position.floor() as isize;
            if index + 1 >= len {
                break;
            }
            let frac = position - index as f64;
            let left = if index < 0 {
                match self.previous {
                    Some(sample) => sample,
                    None => input[0],
                }
            } else {
                input[index as usize]
            };
            let left = sample_to_f32(left);
            let right = sample_to_f32(input[(index + 1) as usize]);
            output.push(f32_to_sample(left + (right - left) * frac as f32));
            position += self.step;
        }

        self.previous = input.last().copied();
        self.position = position - len as f64;
        output
    }

    /// Drop carried state, e.g. after playback was cleared.
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.previous = None;
    }
}
