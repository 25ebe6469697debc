//! Pitch estimators.
//!
//! [`PitchEstimator`] is the interface the capture worker runs on each
//! scheduled frame.  It is object-safe and `Send` so a boxed estimator can be
//! moved into the worker thread.
//!
//! Two implementations exist:
//!
//! * [`FastEstimator`]: YIN over the whole frame.  Cheap enough for every
//!   frame, but it reports a **fixed** confidence whenever it runs, so the
//!   confidence gate cannot reject its estimates.
//! * [`AccurateEstimator`]: McLeod pitch method over overlapping 10 ms
//!   sub-windows; the reported confidence and frequency are the means over
//!   the sub-windows.  Heavier, so it normally runs on every third frame
//!   only (see [`EstimationSchedule`](super::EstimationSchedule)).
//!
//! Both report `frequency_hz == 0.0` when no pitch was detected.

use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::yin::YINDetector;
use pitch_detection::detector::PitchDetector;

use crate::config::{EstimatorConfig, EstimatorKind};

use super::schedule::EstimationSchedule;

// ---------------------------------------------------------------------------
// PitchEstimate
// ---------------------------------------------------------------------------

/// A confidence-weighted guess at the fundamental frequency of a short
/// stretch of audio.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchEstimate {
    /// Reliability in `[0, 1]`; higher is more reliable.
    pub confidence: f32,
    /// Fundamental frequency in Hz; `0.0` when no pitch was found.
    pub frequency_hz: f32,
}

impl PitchEstimate {
    /// Build an estimate, clamping confidence into `[0, 1]` and frequency to
    /// non-negative finite values.
    pub fn new(confidence: f32, frequency_hz: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let frequency_hz = if frequency_hz.is_finite() {
            frequency_hz.max(0.0)
        } else {
            0.0
        };
        Self {
            confidence,
            frequency_hz,
        }
    }

    /// "No pitch": zero confidence, zero frequency.
    pub fn unvoiced() -> Self {
        Self::default()
    }

    /// `true` when the confidence reaches `gate`.
    pub fn passes(&self, gate: f32) -> bool {
        self.confidence >= gate
    }
}

// ---------------------------------------------------------------------------
// PitchEstimator trait
// ---------------------------------------------------------------------------

/// Object-safe interface for frame-level pitch estimation.
pub trait PitchEstimator: Send {
    /// Estimate the pitch of `samples` (mono, at the estimator's rate).
    fn estimate(&mut self, samples: &[f32]) -> PitchEstimate;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// Compile-time assertion: Box<dyn PitchEstimator> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PitchEstimator>) {}
};

/// Build the configured live estimator together with its schedule.
pub fn build_estimator(
    config: &EstimatorConfig,
    sample_rate: u32,
) -> (Box<dyn PitchEstimator>, EstimationSchedule) {
    match config.kind {
        EstimatorKind::Fast => (
            Box::new(FastEstimator::new(config, sample_rate)),
            EstimationSchedule::always(),
        ),
        EstimatorKind::Accurate => (
            Box::new(AccurateEstimator::new(config, sample_rate)),
            EstimationSchedule::every(config.every_nth),
        ),
    }
}

// ---------------------------------------------------------------------------
// FastEstimator
// ---------------------------------------------------------------------------

/// YIN over a single frame with a constant confidence.
pub struct FastEstimator {
    detector: Option<(usize, YINDetector<f32>)>,
    sample_rate: u32,
    confidence: f32,
    power_threshold: f32,
    clarity_threshold: f32,
}

impl FastEstimator {
    pub fn new(config: &EstimatorConfig, sample_rate: u32) -> Self {
        Self {
            detector: None,
            sample_rate,
            confidence: config.fast_confidence,
            power_threshold: config.power_threshold,
            clarity_threshold: config.clarity_threshold,
        }
    }
}

impl PitchEstimator for FastEstimator {
    fn estimate(&mut self, samples: &[f32]) -> PitchEstimate {
        if samples.len() < 4 {
            return PitchEstimate::new(self.confidence, 0.0);
        }
        // The detector's scratch buffers are sized for one signal length.
        let size = samples.len();
        if self.detector.as_ref().map(|(s, _)| *s) != Some(size) {
            self.detector = Some((size, YINDetector::new(size, size / 2)));
        }
        let Some((_, detector)) = self.detector.as_mut() else {
            return PitchEstimate::new(self.confidence, 0.0);
        };
        let frequency = detector
            .get_pitch(
                samples,
                self.sample_rate as usize,
                self.power_threshold,
                self.clarity_threshold,
            )
            .map(|p| p.frequency)
            .unwrap_or(0.0);
        PitchEstimate::new(self.confidence, frequency)
    }

    fn name(&self) -> &'static str {
        "fast"
    }
}

// ---------------------------------------------------------------------------
// WindowDetector
// ---------------------------------------------------------------------------

/// McLeod detector for one fixed window length, reporting clarity as
/// confidence.  Shared by the accurate live estimator and the offline
/// reference-curve computation.
pub struct WindowDetector {
    size: usize,
    detector: McLeodDetector<f32>,
    sample_rate: u32,
    power_threshold: f32,
    clarity_threshold: f32,
}

impl WindowDetector {
    pub fn new(size: usize, sample_rate: u32, config: &EstimatorConfig) -> Self {
        let size = size.max(4);
        Self {
            size,
            detector: McLeodDetector::new(size, size / 2),
            sample_rate,
            power_threshold: config.power_threshold,
            clarity_threshold: config.clarity_threshold,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Estimate the pitch of exactly `size()` samples; shorter input is
    /// zero-padded, longer input truncated.
    pub fn detect(&mut self, window: &[f32]) -> PitchEstimate {
        let pitch = if window.len() == self.size {
            self.detector.get_pitch(
                window,
                self.sample_rate as usize,
                self.power_threshold,
                self.clarity_threshold,
            )
        } else {
            let mut padded = vec![0.0_f32; self.size];
            let n = window.len().min(self.size);
            padded[..n].copy_from_slice(&window[..n]);
            self.detector.get_pitch(
                &padded,
                self.sample_rate as usize,
                self.power_threshold,
                self.clarity_threshold,
            )
        };
        match pitch {
            Some(p) => PitchEstimate::new(p.clarity, p.frequency),
            None => PitchEstimate::unvoiced(),
        }
    }
}

// ---------------------------------------------------------------------------
// AccurateEstimator
// ---------------------------------------------------------------------------

/// McLeod over overlapping sub-windows, averaged.
pub struct AccurateEstimator {
    window: WindowDetector,
    hop: usize,
}

impl AccurateEstimator {
    pub fn new(config: &EstimatorConfig, sample_rate: u32) -> Self {
        Self {
            window: WindowDetector::new(config.sub_window, sample_rate, config),
            hop: config.hop.max(1),
        }
    }
}

impl PitchEstimator for AccurateEstimator {
    fn estimate(&mut self, samples: &[f32]) -> PitchEstimate {
        let size = self.window.size();
        if samples.is_empty() {
            return PitchEstimate::unvoiced();
        }
        if samples.len() <= size {
            return self.window.detect(samples);
        }

        // Confidence averages over every sub-window; frequency only over the
        // voiced ones, so a silent edge lowers confidence but not the pitch.
        let mut count = 0_usize;
        let mut voiced = 0_usize;
        let mut confidence_sum = 0.0_f32;
        let mut frequency_sum = 0.0_f32;
        let mut offset = 0;
        while offset + size <= samples.len() {
            let est = self.window.detect(&samples[offset..offset + size]);
            confidence_sum += est.confidence;
            if est.frequency_hz > 0.0 {
                frequency_sum += est.frequency_hz;
                voiced += 1;
            }
            count += 1;
            offset += self.hop;
        }
        let frequency = if voiced == 0 {
            0.0
        } else {
            frequency_sum / voiced as f32
        };
        PitchEstimate::new(confidence_sum / count as f32, frequency)
    }

    fn name(&self) -> &'static str {
        "accurate"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
