//! Shared application state read by the UI.
//!
//! [`AppState`] is a snapshot of everything the dashboard draws: the
//! preparation status line, the latest [`ChartFrame`], both worker states,
//! and the last error.  The session controller and preparation jobs write
//! it; the egui update loop reads it each frame.
//!
//! [`SharedState`] is `Arc<Mutex<AppState>>`.  It carries snapshots only;
//! audio data and estimates never pass through it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::AppConfig;
use crate::worker::WorkerState;

use super::chart::ChartFrame;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Status line of the preparation flow ("Downloading the song...").
    pub status: String,

    /// `true` while a preparation job is running.
    pub preparing: bool,

    /// Latest render-ready chart.
    pub chart: ChartFrame,

    pub capture: WorkerState,
    pub playback: WorkerState,

    /// Path of the most recently saved recording.
    pub last_recording: Option<PathBuf>,

    /// Last controller or worker error, shown under the status line.
    pub error_message: Option<String>,

    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            status: String::new(),
            preparing: false,
            chart: ChartFrame::empty(
                config.comparison.history_capacity,
                config.comparison.y_max_hz,
            ),
            capture: WorkerState::Idle,
            playback: WorkerState::Idle,
            last_recording: None,
            error_message: None,
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].  Keep critical sections short.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

/// Run `f` with the state locked.  A poisoned lock is recovered, since every
/// field is a plain snapshot.
pub fn with_state<R>(state: &SharedState, f: impl FnOnce(&mut AppState) -> R) -> R {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_idle_with_empty_chart() {
        let st = AppState::default();
        assert_eq!(st.capture, WorkerState::Idle);
        assert_eq!(st.playback, WorkerState::Idle);
        assert!(st.chart.points.is_empty());
        assert_eq!(st.chart.y_domain(), (0.0, 500.0));
        assert!(!st.preparing);
    }

    #[test]
    fn with_state_mutates_shared_snapshot() {
        let shared = new_shared_state(AppConfig::default());
        let other = Arc::clone(&shared);
        with_state(&shared, |st| st.status = "Playing the music...".into());
        assert_eq!(with_state(&other, |st| st.status.clone()), "Playing the music...");
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let shared = new_shared_state(AppConfig::default());
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison");
        })
        .join();
        with_state(&shared, |st| st.error_message = Some("x".into()));
        assert_eq!(with_state(&shared, |st| st.error_message.clone()), Some("x".into()));
    }
}
