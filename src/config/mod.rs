//! Configuration module for pitch practice.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for the platform settings directory, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, ComparisonConfig, EstimatorConfig, EstimatorKind, StorageConfig,
    ToolsConfig, UiConfig,
};
