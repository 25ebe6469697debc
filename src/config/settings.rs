//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a `settings.toml` that only
//! overrides a handful of keys still loads.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// EstimatorKind
// ---------------------------------------------------------------------------

/// Selects the live pitch estimator used by the capture worker.
///
/// | Variant  | Algorithm                         | Confidence         | Runs on        |
/// |----------|-----------------------------------|--------------------|----------------|
/// | Fast     | YIN over one frame                | fixed constant     | every tick     |
/// | Accurate | McLeod over 10 ms sub-windows     | mean clarity       | every Nth tick |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimatorKind {
    Fast,
    Accurate,
}

impl Default for EstimatorKind {
    fn default() -> Self {
        Self::Accurate
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and song playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture / analysis sample rate in Hz.  Device audio is resampled to it.
    pub sample_rate: u32,
    /// Samples per captured frame (1024 @ 16 kHz = 64 ms).
    pub frame_size: usize,
    /// Longest wait for one captured frame before the device is considered
    /// stalled.
    pub read_timeout_ms: u64,
    /// Frames per playback block written to the output device.
    pub playback_block_frames: usize,
    /// Longest wait for the output device to accept one block.
    pub write_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_size: 1024,
            read_timeout_ms: 1_000,
            playback_block_frames: 1024,
            write_timeout_ms: 2_000,
        }
    }
}

impl AudioConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// EstimatorConfig
// ---------------------------------------------------------------------------

/// Settings for the live and offline pitch estimators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Which estimator the capture worker runs.
    pub kind: EstimatorKind,
    /// Run the accurate estimator on tick 0 of every `every_nth` ticks.
    /// The fast estimator always runs on every tick.
    pub every_nth: u32,
    /// Constant confidence reported by the fast estimator.
    pub fast_confidence: f32,
    /// Sub-window length (samples) of the accurate estimator.
    pub sub_window: usize,
    /// Hop between accurate sub-windows (160 samples = 10 ms @ 16 kHz).
    pub hop: usize,
    /// Minimum signal power for a detector to report a pitch.
    pub power_threshold: f32,
    /// Minimum clarity for a detector to report a pitch.
    pub clarity_threshold: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            kind: EstimatorKind::default(),
            every_nth: 3,
            fast_confidence: 0.8,
            sub_window: 512,
            hop: 160,
            power_threshold: 0.1,
            clarity_threshold: 0.3,
        }
    }
}

// ---------------------------------------------------------------------------
// ComparisonConfig
// ---------------------------------------------------------------------------

/// Settings for the live-vs-reference comparison chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Points kept per rolling history (live and reference).
    pub history_capacity: usize,
    /// Live estimates below this confidence carry the previous frequency.
    pub live_gate: f32,
    /// Reference rows below this confidence are drawn transparent.
    pub reference_gate: f32,
    /// Time step between reference-curve rows.
    pub reference_resolution_ms: u64,
    /// Upper bound of the chart's y-domain in Hz.
    pub y_max_hz: f32,
    /// Longest wait for one live estimate per tick.
    pub tick_timeout_ms: u64,
    /// Tick interval while only playback is active.
    pub idle_tick_ms: u64,
    /// Longest wait for the playback worker to report its start time.
    pub start_timeout_ms: u64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            live_gate: 0.5,
            reference_gate: 0.7,
            reference_resolution_ms: 10,
            y_max_hz: 500.0,
            tick_timeout_ms: 1_000,
            idle_tick_ms: 64,
            start_timeout_ms: 5_000,
        }
    }
}

impl ComparisonConfig {
    pub fn reference_resolution(&self) -> Duration {
        Duration::from_millis(self.reference_resolution_ms)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_millis(self.tick_timeout_ms)
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Directories for downloaded songs, separated stems, reference curves and
/// microphone recordings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub downloads_dir: PathBuf,
    pub separated_dir: PathBuf,
    pub results_dir: PathBuf,
    pub recordings_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloaded_songs"),
            separated_dir: PathBuf::from("separated_audio"),
            results_dir: PathBuf::from("pitch_detection_results"),
            recordings_dir: PathBuf::from("recorded_audio"),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

/// External commands used by the preparation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Downloader executable (must accept `yt-dlp` arguments).
    pub downloader: String,
    /// Stem separation executable (must accept `demucs` arguments).
    pub separator: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader: "yt-dlp".into(),
            separator: "demucs".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial window size `(width, height)` in points.
    pub window_size: (f32, f32),
    /// Chart area size `(width, height)` in points.
    pub chart_size: (f32, f32),
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (1100.0, 700.0),
            chart_size: (800.0, 600.0),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use pitch_practice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub estimator: EstimatorConfig,
    pub comparison: ComparisonConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn saved_config_loads_back() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut original = AppConfig::default();
        original.estimator.kind = EstimatorKind::Fast;
        original.comparison.history_capacity = 80;
        original.storage.results_dir = PathBuf::from("/tmp/curves");
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.estimator.kind, EstimatorKind::Fast);
        assert_eq!(loaded.comparison.history_capacity, 80);
        assert_eq!(loaded.storage.results_dir, PathBuf::from("/tmp/curves"));
        assert_eq!(loaded.audio.sample_rate, original.audio.sample_rate);
        assert_eq!(loaded.audio.frame_size, original.audio.frame_size);
        assert_eq!(loaded.tools.downloader, original.tools.downloader);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.comparison.history_capacity, 50);
        assert_eq!(config.estimator.kind, EstimatorKind::Accurate);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[comparison]\nlive_gate = 0.6\n").expect("write");

        let config = AppConfig::load_from(&path).expect("load");

        assert!((config.comparison.live_gate - 0.6).abs() < f32::EPSILON);
        assert!((config.comparison.reference_gate - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.audio.frame_size, 1024);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is = = not toml").expect("write");

        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("deeper").join("settings.toml");

        AppConfig::default().save_to(&path).expect("save");
        assert!(path.exists());
    }

    #[test]
    fn default_reference_resolution_is_10ms() {
        let cmp = ComparisonConfig::default();
        assert_eq!(cmp.reference_resolution(), Duration::from_millis(10));
    }
}
