//! Audio resampling and channel mixing utilities.
//!
//! The pitch estimators expect **mono `f32`** audio at the configured analysis
//! rate (16 kHz by default).  This module provides:
//!
//! 1. [`stereo_to_mono`] / [`mono_to_channels`]: channel down/up-mixing.
//! 2. [`StreamResampler`]: a linear resampler that keeps its fractional read
//!    position across chunks, for audio arriving in device-sized callbacks.
//! 3. [`resample_offline`]: a `rubato` FFT resampler for whole files, used when
//!    the vocal stem is analysed to build a reference curve.

use rubato::{FftFixedIn, Resampler};
use thiserror::Error;

/// Errors from the offline resampler.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("failed to construct resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

// ---------------------------------------------------------------------------
// Channel mixing
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.  A trailing partial frame
/// is dropped.
///
/// ```rust
/// use pitch_practice::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Duplicate each mono sample into `channels` interleaved slots.
pub fn mono_to_channels(mono: &[f32], channels: u16) -> Vec<f32> {
    let n = channels.max(1) as usize;
    let mut out = Vec::with_capacity(mono.len() * n);
    for &s in mono {
        out.extend(std::iter::repeat(s).take(n));
    }
    out
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Linear-interpolating resampler for a continuous mono stream.
///
/// Unlike resampling each chunk independently, the read position and the
/// last input sample carry over between [`process`](Self::process) calls, so
/// chunk boundaries introduce neither drift nor discontinuities.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    source_rate: u32,
    target_rate: u32,
    /// Input samples per output sample.
    step: f64,
    /// Fractional read position relative to `pending[0]`.
    pos: f64,
    /// Unconsumed input (at most one sample survives between calls).
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let step = if target_rate == 0 {
            1.0
        } else {
            source_rate as f64 / target_rate as f64
        };
        Self {
            source_rate,
            target_rate,
            step,
            pos: 0.0,
            pending: Vec::new(),
        }
    }

    /// `true` when source and target rates are equal.
    pub fn is_passthrough(&self) -> bool {
        self.source_rate == self.target_rate
    }

    /// Resample the next chunk of the stream.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }

        self.pending.extend_from_slice(input);
        let mut out = Vec::with_capacity((input.len() as f64 / self.step).ceil() as usize + 1);

        while self.pos + 1.0 < self.pending.len() as f64 {
            let idx = self.pos as usize;
            let frac = (self.pos - idx as f64) as f32;
            out.push(self.pending[idx] * (1.0 - frac) + self.pending[idx + 1] * frac);
            self.pos += self.step;
        }

        let consumed = (self.pos as usize).min(self.pending.len());
        self.pending.drain(..consumed);
        self.pos -= consumed as f64;
        out
    }
}

// ---------------------------------------------------------------------------
// resample_offline
// ---------------------------------------------------------------------------

const OFFLINE_CHUNK: usize = 1024;

/// Resample a whole mono signal from `source_rate` to `target_rate` with an
/// FFT resampler.
///
/// The resampler's output delay is removed, so sample `i` of the output is
/// time-aligned with sample `i * source_rate / target_rate` of the input.
/// The output length is `ceil(samples.len() * target_rate / source_rate)`.
pub fn resample_offline(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, ResampleError> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let expected =
        (samples.len() as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        OFFLINE_CHUNK,
        2,
        1,
    )?;
    let delay = resampler.output_delay();

    let mut out = Vec::with_capacity(expected + delay + OFFLINE_CHUNK);
    let mut pos = 0;
    while pos + resampler.input_frames_next() <= samples.len() {
        let n = resampler.input_frames_next();
        let chunk = resampler.process(&[&samples[pos..pos + n]], None)?;
        out.extend_from_slice(&chunk[0]);
        pos += n;
    }
    if pos < samples.len() {
        let tail: [&[f32]; 1] = [&samples[pos..]];
        let chunk = resampler.process_partial(Some(&tail[..]), None)?;
        out.extend_from_slice(&chunk[0]);
    }
    // Flush the samples still held back by the resampler's delay line.
    while out.len() < expected + delay {
        let chunk = resampler.process_partial(None::<&[&[f32]]>, None)?;
        if chunk[0].is_empty() {
            break;
        }
        out.extend_from_slice(&chunk[0]);
    }

    let mut aligned = out.split_off(delay.min(out.len()));
    aligned.resize(expected, 0.0);
    Ok(aligned)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- channel mixing ----------------------------------------------------

    #[test]
    fn stereo_to_mono_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(stereo_to_mono(&input, 1), input);
    }

    #[test]
    fn stereo_to_mono_two_channel() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = stereo_to_mono(&input, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stereo_to_mono_zero_channels() {
        assert!(stereo_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    #[test]
    fn mono_to_stereo_duplicates_samples() {
        let out = mono_to_channels(&[0.1, 0.2], 2);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);
    }

    // ---- StreamResampler ---------------------------------------------------

    #[test]
    fn passthrough_when_rates_match() {
        let mut rs = StreamResampler::new(16_000, 16_000);
        let input: Vec<f32> = (0..160).map(|i| i as f32).collect();
        assert_eq!(rs.process(&input), input);
    }

    #[test]
    fn downsample_48k_to_16k_across_chunks_keeps_total_length() {
        let mut rs = StreamResampler::new(48_000, 16_000);
        let mut total = 0;
        // 1 s of audio in 100 uneven chunks
        for i in 0..100 {
            let len = if i % 2 == 0 { 470 } else { 490 };
            total += rs.process(&vec![0.25_f32; len]).len();
        }
        assert!(total.abs_diff(16_000) <= 1, "got {total}");
    }

    #[test]
    fn constant_signal_keeps_amplitude() {
        let mut rs = StreamResampler::new(44_100, 16_000);
        for s in rs.process(&vec![0.5_f32; 4_410]) {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn ramp_stays_continuous_across_chunk_boundary() {
        // Upsample a ramp 0,1,2,... by 2x; output must be 0,0.5,1,1.5,...
        let mut rs = StreamResampler::new(8_000, 16_000);
        let mut out = rs.process(&[0.0, 1.0, 2.0]);
        out.extend(rs.process(&[3.0, 4.0]));
        for (i, s) in out.iter().enumerate() {
            assert!((s - i as f32 * 0.5).abs() < 1e-5, "index {i}: {s}");
        }
    }

    // ---- resample_offline --------------------------------------------------

    #[test]
    fn offline_same_rate_is_noop() {
        let input = vec![0.1_f32; 100];
        assert_eq!(resample_offline(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn offline_44100_to_16k_has_expected_length() {
        let input = vec![0.0_f32; 44_100];
        let out = resample_offline(&input, 44_100, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }
}
