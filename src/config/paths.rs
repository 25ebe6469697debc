//! Cross-platform settings location using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\pitch-practice\
//!   macOS:   ~/Library/Application Support/pitch-practice/
//!   Linux:   ~/.config/pitch-practice/
//!
//! Song, stem, reference and recording directories are configured in
//! [`StorageConfig`](super::StorageConfig) and resolve relative to the
//! working directory unless given as absolute paths.

use std::path::PathBuf;

/// Holds the resolved settings paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "pitch-practice";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
