//! Background workers for live capture and song playback.
//!
//! Each worker owns its own audio device on a dedicated OS thread and talks
//! to the controller only through channels:
//!
//! ```text
//! capture-worker  ──PitchEstimate (mpsc, unbounded)──▶ controller
//! playback-worker ──Instant (sync_channel(1))────────▶ controller
//! controller      ──CancelToken──────────────────────▶ either worker
//! ```

pub mod cancel;
pub mod capture;
pub mod handle;
pub mod playback;
pub mod state;

use thiserror::Error;

use crate::audio::{CaptureError, PlaybackError, RecordingError};

pub use cancel::CancelToken;
pub use capture::{CaptureOutcome, LiveCaptureWorker};
pub use handle::WorkerHandle;
pub use playback::{PlaybackOutcome, PlaybackWorker};
pub use state::{StateCell, WorkerKind, WorkerState};

// ---------------------------------------------------------------------------
// WorkerError
// ---------------------------------------------------------------------------

/// Failures caught at a worker boundary.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{0} panicked")]
    Panicked(&'static str),
}
