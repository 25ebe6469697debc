//! Fixed-length mono audio frames.

/// A fixed-length block of mono samples at a known sample rate.
///
/// Produced by a [`FrameSource`](crate::audio::FrameSource), consumed by a
/// pitch estimator, and buffered by the capture worker for the recording.
/// Samples are `f32` in `[-1.0, 1.0]`; on disk they become 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Convert an `f32` sample to 16-bit PCM, clamping out-of-range values and
/// mapping non-finite values to silence.
pub fn sample_to_i16(s: f32) -> i16 {
    if s.is_finite() {
        (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    } else {
        0
    }
}
