//! Live comparison pipeline.
//!
//! # Architecture
//!
//! ```text
//! UI ──SessionCommand (mpsc)──▶ PracticeSession::run()   ← controller thread
//!                                   │
//!                                   ├─ Record     → LiveCaptureWorker ──PitchEstimate──┐
//!                                   ├─ Play       → PlaybackWorker ─────Instant────────┤
//!                                   │                                                  ▼
//!                                   └─ tick() ── LiveComparison (gate, histories) ── ChartFrame
//!
//! SharedState (Arc<Mutex<AppState>>) ◀─── ChartFrame + worker states, read by egui each frame
//! ```

pub mod chart;
pub mod compare;
pub mod controller;
pub mod state;

pub use chart::{ChartFrame, ChartPoint, PointColor};
pub use compare::{LiveComparison, RollingHistory};
pub use controller::{PracticeSession, SessionCommand, SessionError};
pub use state::{new_shared_state, with_state, AppState, SharedState};
