//! Reference pitch curves.
//!
//! A [`ReferenceCurve`] is the precomputed pitch trajectory of a song's
//! isolated vocal stem: one [`ReferenceRow`] per 10 ms step.  It is computed
//! once, persisted as CSV (`Time,Frequency,Confidence`) under the results
//! directory with the song identifier as file stem, and read-only afterwards.
//!
//! During playback the controller maps elapsed playback time to a row index
//! and picks the most confident row in a two-row window ending at that index.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{resample_offline, PlaybackError, WavSource};
use crate::audio::resample::ResampleError;
use crate::config::EstimatorConfig;

use super::estimator::WindowDetector;

/// File extension of persisted curves.
pub const CURVE_EXTENSION: &str = "csv";

// ---------------------------------------------------------------------------
// ReferenceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference curve I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed reference curve: {0}")]
    Csv(#[from] csv::Error),

    #[error("reference curve time is not increasing at row {row}")]
    NotMonotonic { row: usize },

    #[error("failed to read vocal stem: {0}")]
    Audio(#[from] PlaybackError),

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

// ---------------------------------------------------------------------------
// ReferenceRow
// ---------------------------------------------------------------------------

/// One step of a reference curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    #[serde(rename = "Time")]
    pub time_secs: f64,
    #[serde(rename = "Frequency")]
    pub frequency_hz: f32,
    #[serde(rename = "Confidence")]
    pub confidence: f32,
}

impl ReferenceRow {
    pub fn new(time_secs: f64, frequency_hz: f32, confidence: f32) -> Self {
        Self {
            time_secs,
            frequency_hz,
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// ReferenceCurve
// ---------------------------------------------------------------------------

/// Time-indexed, read-only pitch table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCurve {
    rows: Vec<ReferenceRow>,
    resolution: Duration,
}

impl ReferenceCurve {
    /// Build a curve, rejecting rows whose time does not strictly increase.
    pub fn new(rows: Vec<ReferenceRow>, resolution: Duration) -> Result<Self, ReferenceError> {
        if let Some(row) = rows
            .windows(2)
            .position(|pair| pair[1].time_secs <= pair[0].time_secs)
        {
            return Err(ReferenceError::NotMonotonic { row: row + 1 });
        }
        Ok(Self {
            rows,
            resolution: resolution.max(Duration::from_nanos(1)),
        })
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Row index for a playback position: `floor(elapsed / resolution)`.
    ///
    /// Integer nanosecond arithmetic, so the mapping is monotonic.
    pub fn index_for(&self, elapsed: Duration) -> usize {
        let index = elapsed.as_nanos() / self.resolution.as_nanos();
        usize::try_from(index).unwrap_or(usize::MAX)
    }

    /// The reference point shown at `elapsed`.
    ///
    /// Looks at rows `[index - 1, index]` (clamped to the curve) and returns
    /// the one with the highest confidence; on a tie the earlier row wins.
    /// Returns `None` once playback has run past the end of the curve.
    pub fn lookup(&self, elapsed: Duration) -> Option<ReferenceRow> {
        let index = self.index_for(elapsed);
        let lo = index.saturating_sub(1);
        if lo >= self.rows.len() {
            return None;
        }
        let hi = index.min(self.rows.len() - 1);

        let mut best = self.rows[lo];
        for row in &self.rows[lo + 1..=hi] {
            if row.confidence > best.confidence {
                best = *row;
            }
        }
        Some(best)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Where the curve for `song_id` lives.
    pub fn path_for(results_dir: &Path, song_id: &str) -> PathBuf {
        results_dir.join(format!("{song_id}.{CURVE_EXTENSION}"))
    }

    pub fn load(path: &Path, resolution: Duration) -> Result<Self, ReferenceError> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize::<ReferenceRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rows, resolution)
    }

    /// Write the curve as CSV, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ReferenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Offline computation
    // -----------------------------------------------------------------------

    /// Estimate a curve over mono `samples` at `sample_rate`, one row per
    /// `resolution` step.
    ///
    /// Each step analyses a `config.sub_window`-sample window centred on the
    /// step's time (zero-padded at the edges).
    pub fn estimate(
        samples: &[f32],
        sample_rate: u32,
        config: &EstimatorConfig,
        resolution: Duration,
    ) -> Result<Self, ReferenceError> {
        let hop = ((sample_rate as u128 * resolution.as_nanos()) / 1_000_000_000).max(1) as usize;
        let mut detector = WindowDetector::new(config.sub_window, sample_rate, config);
        let size = detector.size();
        let half = size / 2;

        let steps = samples.len().div_ceil(hop);
        let mut rows = Vec::with_capacity(steps);
        let mut window = vec![0.0_f32; size];
        for step in 0..steps {
            let center = step * hop;
            window.fill(0.0);
            // Copy samples[center - half .. center - half + size] with padding.
            for (i, slot) in window.iter_mut().enumerate() {
                let src = (center + i).checked_sub(half);
                if let Some(s) = src.and_then(|idx| samples.get(idx)) {
                    *slot = *s;
                }
            }
            let est = detector.detect(&window);
            rows.push(ReferenceRow::new(
                step as f64 * resolution.as_secs_f64(),
                est.frequency_hz,
                est.confidence,
            ));
        }
        Self::new(rows, resolution)
    }

    /// Decode a WAV stem, resample it to `analysis_rate`, and estimate its
    /// curve.
    pub fn compute_from_wav(
        path: &Path,
        analysis_rate: u32,
        config: &EstimatorConfig,
        resolution: Duration,
    ) -> Result<Self, ReferenceError> {
        let mut source = WavSource::open(path)?;
        let source_rate = source.sample_rate();
        let mono = source.read_all_mono()?;
        let samples = resample_offline(&mono, source_rate, analysis_rate)?;
        log::info!(
            "reference: analysing {} ({:.1} s)",
            path.display(),
            samples.len() as f64 / analysis_rate.max(1) as f64
        );
        Self::estimate(&samples, analysis_rate, config, resolution)
    }
}

/// File names of all persisted curves in `results_dir`, sorted.
///
/// A missing directory yields an empty list.
pub fn list_curves(results_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(results_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == CURVE_EXTENSION))
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_owned))
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::estimator::tests::sine;
    use tempfile::tempdir;

    const RES: Duration = Duration::from_millis(10);

    fn curve(rows: &[(f64, f32, f32)]) -> ReferenceCurve {
        ReferenceCurve::new(
            rows.iter()
                .map(|&(t, f, c)| ReferenceRow::new(t, f, c))
                .collect(),
            RES,
        )
        .unwrap()
    }

    #[test]
    fn window_picks_most_confident_row() {
        let c = curve(&[(0.00, 200.0, 0.4), (0.01, 205.0, 0.9), (0.02, 210.0, 0.3)]);
        let row = c.lookup(Duration::from_millis(10)).unwrap();
        assert_eq!(row.frequency_hz, 205.0);
        assert!((row.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn tie_goes_to_the_earlier_row() {
        let c = curve(&[(0.00, 200.0, 0.8), (0.01, 300.0, 0.8)]);
        assert_eq!(c.lookup(Duration::from_millis(10)).unwrap().frequency_hz, 200.0);
    }

    #[test]
    fn start_of_playback_uses_first_row() {
        let c = curve(&[(0.00, 200.0, 0.1), (0.01, 300.0, 0.9)]);
        assert_eq!(c.lookup(Duration::ZERO).unwrap().frequency_hz, 200.0);
    }

    #[test]
    fn index_lookup_is_monotonic_in_elapsed_time() {
        let c = curve(&[(0.0, 1.0, 1.0)]);
        let mut prev = 0;
        for micros in (0..2_000_000_u64).step_by(997) {
            let idx = c.index_for(Duration::from_micros(micros));
            assert!(idx >= prev, "index went backwards at {micros} µs");
            prev = idx;
        }
        assert_eq!(c.index_for(Duration::from_millis(10)), 1);
        assert_eq!(c.index_for(Duration::from_micros(19_999)), 1);
    }

    #[test]
    fn lookup_past_the_end_is_none() {
        let c = curve(&[(0.00, 200.0, 0.4), (0.01, 205.0, 0.9)]);
        // index 2 still sees row 1 through the window
        assert!(c.lookup(Duration::from_millis(20)).is_some());
        assert!(c.lookup(Duration::from_millis(30)).is_none());
    }

    #[test]
    fn empty_curve_never_yields_a_point() {
        let c = curve(&[]);
        assert!(c.lookup(Duration::ZERO).is_none());
    }

    #[test]
    fn non_increasing_time_is_rejected() {
        let rows = vec![ReferenceRow::new(0.01, 1.0, 1.0), ReferenceRow::new(0.01, 1.0, 1.0)];
        assert!(matches!(
            ReferenceCurve::new(rows, RES),
            Err(ReferenceError::NotMonotonic { row: 1 })
        ));
    }

    #[test]
    fn csv_has_original_headers_and_loads_back() {
        let dir = tempdir().unwrap();
        let path = ReferenceCurve::path_for(&dir.path().join("results"), "song");
        let c = curve(&[(0.0, 200.0, 0.4), (0.01, 205.5, 0.9)]);
        c.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Time,Frequency,Confidence"));

        let loaded = ReferenceCurve::load(&path, RES).unwrap();
        assert_eq!(loaded, c);
        assert_eq!(list_curves(&dir.path().join("results")), vec!["song.csv".to_string()]);
    }

    #[test]
    fn list_curves_of_missing_dir_is_empty() {
        assert!(list_curves(Path::new("/nonexistent/results")).is_empty());
    }

    #[test]
    fn estimate_tracks_a_steady_tone() {
        let config = EstimatorConfig::default();
        let samples = sine(250.0, 16_000, 16_000); // 1 s
        let c = ReferenceCurve::estimate(&samples, 16_000, &config, RES).unwrap();

        assert_eq!(c.len(), 100);
        assert!((c.rows()[1].time_secs - 0.01).abs() < 1e-9);
        let mid = c.rows()[50];
        assert!((mid.frequency_hz - 250.0).abs() < 5.0, "got {mid:?}");
        assert!(mid.confidence > 0.8);
    }
}
