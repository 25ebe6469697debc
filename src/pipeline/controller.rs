//! Live comparison controller.
//!
//! [`PracticeSession`] is the explicit session context: it owns the worker
//! handles, the estimate receiver, the playback clock, the loaded reference
//! curve, and the [`LiveComparison`].  It runs on its own thread and is
//! driven by [`SessionCommand`]s from the UI.
//!
//! # Tick cadence
//!
//! ```text
//! capture active   → tick = one estimate from the queue (bounded by tick_timeout)
//! playback only    → tick every idle_tick (64 ms)
//! neither          → block on the command channel
//! ```
//!
//! Each tick appends at most one live and one reference point, then
//! publishes a fresh [`ChartFrame`](super::ChartFrame) to [`SharedState`].

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audio::AudioDevices;
use crate::config::AppConfig;
use crate::pitch::{build_estimator, PitchEstimate, ReferenceCurve, ReferenceError};
use crate::worker::{
    CaptureOutcome, LiveCaptureWorker, PlaybackOutcome, PlaybackWorker, WorkerError,
    WorkerHandle, WorkerState,
};

use super::compare::LiveComparison;
use super::state::{with_state, SharedState};

// ---------------------------------------------------------------------------
// SessionCommand / SessionError
// ---------------------------------------------------------------------------

/// UI actions understood by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Play `song` and compare against the curve stored at `reference`.
    Play { song: PathBuf, reference: PathBuf },
    StopMusic,
    Record,
    StopRecord,
    Shutdown,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load reference curve: {0}")]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("playback did not start within {0:?}")]
    StartTimeout(Duration),

    #[error("playback failed to start")]
    PlaybackNotStarted,
}

// ---------------------------------------------------------------------------
// PracticeSession
// ---------------------------------------------------------------------------

pub struct PracticeSession {
    config: AppConfig,
    devices: Arc<dyn AudioDevices>,
    state: SharedState,
    comparison: LiveComparison,

    capture: Option<WorkerHandle<CaptureOutcome>>,
    estimates: Option<Receiver<PitchEstimate>>,

    playback: Option<WorkerHandle<PlaybackOutcome>>,
    clock: Option<Instant>,
    reference: Option<ReferenceCurve>,
}

impl PracticeSession {
    pub fn new(config: AppConfig, devices: Arc<dyn AudioDevices>, state: SharedState) -> Self {
        Self {
            comparison: LiveComparison::new(&config.comparison),
            config,
            devices,
            state,
            capture: None,
            estimates: None,
            playback: None,
            clock: None,
            reference: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// When the current playback session started, once reported.
    pub fn clock(&self) -> Option<Instant> {
        self.clock
    }

    pub fn comparison(&self) -> &LiveComparison {
        &self.comparison
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Run until `Shutdown` arrives or the command channel closes.  Active
    /// workers are stopped and joined before returning.
    pub fn run(mut self, commands: Receiver<SessionCommand>) {
        log::info!("session: controller started");
        loop {
            let next = if self.is_capturing() {
                match commands.try_recv() {
                    Ok(cmd) => Some(cmd),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else if self.is_playing() {
                match commands.recv_timeout(self.config.comparison.idle_tick()) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match commands.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                }
            };

            match next {
                Some(cmd) => {
                    if !self.handle(cmd) {
                        break;
                    }
                }
                None => self.tick(),
            }
        }
        self.shutdown();
        log::info!("session: controller stopped");
    }

    /// Apply one command.  Returns `false` on `Shutdown`.
    pub fn handle(&mut self, command: SessionCommand) -> bool {
        log::debug!("session: {command:?}");
        let result = match command {
            SessionCommand::Play { song, reference } => self.start_playback(song, &reference),
            SessionCommand::StopMusic => {
                self.stop_playback();
                Ok(())
            }
            SessionCommand::Record => self.start_recording(),
            SessionCommand::StopRecord => {
                self.stop_recording();
                Ok(())
            }
            SessionCommand::Shutdown => return false,
        };
        if let Err(e) = result {
            self.set_error(e.to_string());
        }
        self.publish();
        true
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the chart by one step.
    pub fn tick(&mut self) {
        let tick_timeout = self.config.comparison.tick_timeout();
        match self.estimates.as_ref().map(|rx| rx.recv_timeout(tick_timeout)) {
            Some(Ok(estimate)) => {
                self.comparison.push_live(estimate);
            }
            Some(Err(RecvTimeoutError::Timeout)) => {
                log::debug!("session: no estimate this tick");
            }
            Some(Err(RecvTimeoutError::Disconnected)) => {
                // The worker ended on its own (device failure or stall).
                self.stop_recording();
            }
            None => {}
        }

        if let (Some(clock), Some(curve)) = (self.clock, &self.reference) {
            if let Some(row) = curve.lookup(clock.elapsed()) {
                self.comparison.push_reference(row);
            }
        }

        if self.playback.as_ref().is_some_and(WorkerHandle::is_finished) {
            self.stop_playback();
        }

        self.publish();
    }

    // -----------------------------------------------------------------------
    // Recording lifecycle
    // -----------------------------------------------------------------------

    fn start_recording(&mut self) -> Result<(), SessionError> {
        if self.capture.is_some() {
            log::info!("session: restarting capture");
            self.stop_recording();
        }
        self.comparison.reset_live();

        let audio = self.config.audio.clone();
        let (estimator, schedule) = build_estimator(&self.config.estimator, audio.sample_rate);
        let (tx, rx) = mpsc::channel();
        let worker = LiveCaptureWorker::new(
            estimator,
            schedule,
            tx,
            self.config.storage.recordings_dir.clone(),
            audio.read_timeout(),
        );
        let devices = Arc::clone(&self.devices);
        let handle = worker.spawn(move || devices.open_input(&audio))?;

        self.capture = Some(handle);
        self.estimates = Some(rx);
        with_state(&self.state, |st| st.error_message = None);
        Ok(())
    }

    /// Stop and join the capture worker, if any.  Returns the saved
    /// recording.
    pub fn stop_recording(&mut self) -> Option<PathBuf> {
        let handle = self.capture.take()?;
        self.estimates = None;
        match handle.stop() {
            Ok(outcome) => {
                let failed = outcome.error.is_some();
                with_state(&self.state, |st| {
                    st.capture = if failed {
                        WorkerState::Failed
                    } else {
                        WorkerState::Terminated
                    };
                    if outcome.recording.is_some() {
                        st.last_recording = outcome.recording.clone();
                    }
                });
                if let Some(e) = outcome.error {
                    self.set_error(format!("Recording stopped: {e}"));
                }
                outcome.recording
            }
            Err(e) => {
                with_state(&self.state, |st| st.capture = WorkerState::Failed);
                self.set_error(e.to_string());
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Playback lifecycle
    // -----------------------------------------------------------------------

    fn start_playback(&mut self, song: PathBuf, reference: &Path) -> Result<(), SessionError> {
        if self.playback.is_some() {
            log::info!("session: restarting playback");
            self.stop_playback();
        }
        self.comparison.reset_reference();

        let curve = ReferenceCurve::load(reference, self.config.comparison.reference_resolution())?;
        log::info!(
            "session: loaded {} reference row(s) from {}",
            curve.len(),
            reference.display()
        );

        let (tx, rx) = mpsc::sync_channel(1);
        let devices = Arc::clone(&self.devices);
        let write_timeout = self.config.audio.write_timeout();
        let handle = PlaybackWorker::new(song, self.config.audio.playback_block_frames, tx)
            .spawn(move |rate, channels| devices.open_output(rate, channels, write_timeout))?;

        let timeout = self.config.comparison.start_timeout();
        match rx.recv_timeout(timeout) {
            Ok(started) => {
                self.clock = Some(started);
                self.reference = Some(curve);
                self.playback = Some(handle);
                with_state(&self.state, |st| {
                    st.playback = WorkerState::Running;
                    st.error_message = None;
                });
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                handle.cancel();
                with_state(&self.state, |st| st.playback = WorkerState::Failed);
                if handle.is_finished() {
                    match handle.join() {
                        Ok(PlaybackOutcome { error: Some(e), .. }) => {
                            log::warn!("session: playback worker failed: {e}");
                        }
                        Ok(_) => {}
                        Err(e) => log::warn!("session: {e}"),
                    }
                } else {
                    // Cancelled; the thread exits at its next check.
                    log::warn!("session: playback worker still starting, detaching it");
                }
                Err(SessionError::StartTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                with_state(&self.state, |st| st.playback = WorkerState::Failed);
                match handle.join() {
                    Ok(PlaybackOutcome { error: Some(e), .. }) => Err(e.into()),
                    Ok(_) => Err(SessionError::PlaybackNotStarted),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Stop and join the playback worker, if any; clears the clock.
    pub fn stop_playback(&mut self) {
        self.clock = None;
        self.reference = None;
        let Some(handle) = self.playback.take() else {
            return;
        };
        match handle.stop() {
            Ok(outcome) => {
                let failed = outcome.error.is_some();
                with_state(&self.state, |st| {
                    st.playback = if failed {
                        WorkerState::Failed
                    } else {
                        WorkerState::Terminated
                    };
                });
                if let Some(e) = outcome.error {
                    self.set_error(format!("Playback stopped: {e}"));
                }
            }
            Err(e) => {
                with_state(&self.state, |st| st.playback = WorkerState::Failed);
                self.set_error(e.to_string());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn shutdown(&mut self) {
        self.stop_recording();
        self.stop_playback();
        self.publish();
    }

    fn publish(&self) {
        let frame = self.comparison.frame();
        let capture = self.capture.as_ref().map(WorkerHandle::state);
        let playback = self.playback.as_ref().map(WorkerHandle::state);
        with_state(&self.state, |st| {
            st.chart = frame;
            if let Some(s) = capture {
                st.capture = s;
            }
            if let Some(s) = playback {
                st.playback = s;
            }
        });
    }

    fn set_error(&self, message: String) {
        log::error!("session: {message}");
        with_state(&self.state, |st| st.error_message = Some(message));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
