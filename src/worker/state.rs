//! Worker lifecycle states.
//!
//! Both workers follow the same machine; only the label of the running
//! state differs (`Capturing` vs `Playing`):
//!
//! ```text
//! Idle ──spawn──▶ Running ──cancel / end of input──▶ Stopping ──▶ Terminated
//!   │                │
//!   └─open failed─▶ Failed ◀──device error──┘
//! ```

use std::sync::{Arc, Mutex};

/// Which worker a state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Capture,
    Playback,
}

impl WorkerKind {
    /// Thread name for this worker.
    pub fn thread_name(self) -> &'static str {
        match self {
            WorkerKind::Capture => "capture-worker",
            WorkerKind::Playback => "playback-worker",
        }
    }
}

/// Lifecycle state of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Running,
    Stopping,
    Terminated,
    Failed,
}

impl WorkerState {
    /// Status-line label.
    pub fn label(self, kind: WorkerKind) -> &'static str {
        match (self, kind) {
            (WorkerState::Idle, _) => "Idle",
            (WorkerState::Running, WorkerKind::Capture) => "Capturing",
            (WorkerState::Running, WorkerKind::Playback) => "Playing",
            (WorkerState::Stopping, _) => "Stopping",
            (WorkerState::Terminated, _) => "Stopped",
            (WorkerState::Failed, _) => "Failed",
        }
    }
}

/// Observable state cell written by the worker thread, read by the
/// controller.
#[derive(Debug, Clone, Default)]
pub struct StateCell {
    inner: Arc<Mutex<WorkerState>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> WorkerState {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, state: WorkerState) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}
