//! Live capture worker.
//!
//! Runs on its own thread, reads one frame per tick from a [`FrameSource`],
//! appends it to an in-memory [`Recording`], runs the estimator on scheduled
//! ticks, and pushes each estimate onto an unbounded queue.  On stop the
//! recording is flushed to `<recordings_dir>/YYYYMMDDHHMMSS.wav`.
//!
//! ```text
//! loop {
//!     cancelled?            → Stopping
//!     read_frame(timeout)   → Timeout / error → Failed (recording still flushed)
//!     cancelled meanwhile?  → discard frame, Stopping
//!     record frame
//!     schedule.next_tick()  → estimator.estimate → estimates.send
//! }
//! ```

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::audio::{CaptureError, FrameSource, Recording};
use crate::pitch::{EstimationSchedule, PitchEstimate, PitchEstimator};

use super::cancel::CancelToken;
use super::handle::WorkerHandle;
use super::state::{StateCell, WorkerKind, WorkerState};
use super::WorkerError;

/// What a finished capture worker reports back.
#[derive(Debug, Default)]
pub struct CaptureOutcome {
    /// Path of the written recording, if any frames were captured.
    pub recording: Option<PathBuf>,
    /// Frames appended to the recording.
    pub frames: usize,
    /// Estimates pushed onto the queue.
    pub estimates: usize,
    /// Why the worker failed, if it did.
    pub error: Option<WorkerError>,
}

/// Configured capture worker, ready to spawn.
pub struct LiveCaptureWorker {
    estimator: Box<dyn PitchEstimator>,
    schedule: EstimationSchedule,
    estimates: Sender<PitchEstimate>,
    recordings_dir: PathBuf,
    read_timeout: Duration,
}

impl LiveCaptureWorker {
    pub fn new(
        estimator: Box<dyn PitchEstimator>,
        schedule: EstimationSchedule,
        estimates: Sender<PitchEstimate>,
        recordings_dir: PathBuf,
        read_timeout: Duration,
    ) -> Self {
        Self {
            estimator,
            schedule,
            estimates,
            recordings_dir,
            read_timeout,
        }
    }

    /// Start the worker thread.  `open` runs on that thread and must produce
    /// the frame source.
    pub fn spawn<F, S>(self, open: F) -> Result<WorkerHandle<CaptureOutcome>, WorkerError>
    where
        F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
        S: FrameSource,
    {
        WorkerHandle::spawn(WorkerKind::Capture, move |token, state| {
            self.run(open, &token, &state)
        })
    }

    fn run<F, S>(mut self, open: F, token: &CancelToken, state: &StateCell) -> CaptureOutcome
    where
        F: FnOnce() -> Result<S, CaptureError>,
        S: FrameSource,
    {
        let mut source = match open() {
            Ok(source) => source,
            Err(e) => {
                log::error!("capture: failed to open input: {e}");
                state.set(WorkerState::Failed);
                return CaptureOutcome {
                    error: Some(e.into()),
                    ..CaptureOutcome::default()
                };
            }
        };

        state.set(WorkerState::Running);
        log::info!(
            "capture: started ({} estimator, every {} frame(s))",
            self.estimator.name(),
            self.schedule.interval()
        );

        let mut outcome = CaptureOutcome::default();
        let mut recording = Recording::new(source.sample_rate());

        loop {
            if token.is_cancelled() {
                break;
            }
            let frame = match source.read_frame(self.read_timeout) {
                Ok(frame) => frame,
                Err(CaptureError::Timeout(waited)) => {
                    log::warn!("capture: device stalled, no frame within {waited:?}");
                    outcome.error = Some(CaptureError::Timeout(waited).into());
                    break;
                }
                Err(e) => {
                    log::error!("capture: read failed: {e}");
                    outcome.error = Some(e.into());
                    break;
                }
            };
            // Stop was requested while the read was in flight.
            if token.is_cancelled() {
                log::debug!("capture: discarding frame read after stop");
                break;
            }

            recording.push_frame(&frame);
            outcome.frames += 1;

            if self.schedule.next_tick() {
                let estimate = self.estimator.estimate(&frame.samples);
                if self.estimates.send(estimate).is_err() {
                    log::debug!("capture: estimate receiver dropped");
                    break;
                }
                outcome.estimates += 1;
            }
        }

        state.set(WorkerState::Stopping);
        source.close();

        if !recording.is_empty() {
            match recording.save(&self.recordings_dir, &chrono::Local::now()) {
                Ok(path) => {
                    log::info!(
                        "capture: saved {} frame(s) to {}",
                        outcome.frames,
                        path.display()
                    );
                    outcome.recording = Some(path);
                }
                Err(e) => {
                    log::error!("capture: failed to save recording: {e}");
                    outcome.error.get_or_insert(e.into());
                }
            }
        }

        state.set(if outcome.error.is_some() {
            WorkerState::Failed
        } else {
            WorkerState::Terminated
        });
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFrame;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use tempfile::tempdir;

    const FRAME: usize = 64;

    /// Scripted step for [`ScriptedSource`].
    enum Step {
        Frame(f32),
        /// Return a frame but raise the stop signal while "reading" it.
        FrameThenCancel(f32),
        Stall,
    }

    /// Frame source that plays back a fixed script, then blocks until
    /// cancelled.
    struct ScriptedSource {
        steps: VecDeque<Step>,
        token: Option<CancelToken>,
        closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self, timeout: Duration) -> Result<AudioFrame, CaptureError> {
            match self.steps.pop_front() {
                Some(Step::Frame(v)) => Ok(AudioFrame::new(vec![v; FRAME], 16_000)),
                Some(Step::FrameThenCancel(v)) => {
                    if let Some(token) = &self.token {
                        token.cancel();
                    }
                    Ok(AudioFrame::new(vec![v; FRAME], 16_000))
                }
                Some(Step::Stall) | None => Err(CaptureError::Timeout(timeout)),
            }
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn close(&mut self) {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    /// Estimator that reports the first sample as the frequency.
    struct EchoEstimator;

    impl PitchEstimator for EchoEstimator {
        fn estimate(&mut self, samples: &[f32]) -> PitchEstimate {
            PitchEstimate::new(1.0, samples.first().copied().unwrap_or(0.0) * 1000.0)
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    fn worker(dir: &std::path::Path, every: u32) -> (LiveCaptureWorker, mpsc::Receiver<PitchEstimate>) {
        let (tx, rx) = mpsc::channel();
        let w = LiveCaptureWorker::new(
            Box::new(EchoEstimator),
            EstimationSchedule::every(every),
            tx,
            dir.to_path_buf(),
            Duration::from_millis(20),
        );
        (w, rx)
    }

    fn read_wav(path: &std::path::Path) -> Vec<i16> {
        hound::WavReader::open(path)
            .unwrap()
            .samples::<i16>()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn frames_before_stop_are_kept_and_none_after() {
        let dir = tempdir().unwrap();
        let (w, rx) = worker(dir.path(), 1);
        let token = CancelToken::new();
        let state = StateCell::new();
        let source = ScriptedSource {
            steps: VecDeque::from([
                Step::Frame(0.1),
                Step::Frame(0.2),
                Step::Frame(0.3),
                Step::FrameThenCancel(0.4),
                Step::Frame(0.5),
            ]),
            token: Some(token.clone()),
            closed: Default::default(),
        };
        let closed = source.closed.clone();

        let outcome = w.run(move || Ok(source), &token, &state);

        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(outcome.frames, 3);
        assert_eq!(state.get(), WorkerState::Terminated);
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));

        let samples = read_wav(outcome.recording.as_ref().unwrap());
        assert_eq!(samples.len(), 3 * FRAME);
        // The in-flight 0.4 frame must not appear.
        let expected = crate::audio::frame::sample_to_i16(0.3);
        assert_eq!(*samples.last().unwrap(), expected);

        let freqs: Vec<f32> = rx.try_iter().map(|e| e.frequency_hz.round()).collect();
        assert_eq!(freqs, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn schedule_limits_estimates_but_not_recording() {
        let dir = tempdir().unwrap();
        let (w, rx) = worker(dir.path(), 3);
        let token = CancelToken::new();
        let source = ScriptedSource {
            steps: (0..7).map(|_| Step::Frame(0.1)).chain([Step::FrameThenCancel(0.1)]).collect(),
            token: Some(token.clone()),
            closed: Default::default(),
        };

        let outcome = w.run(move || Ok(source), &token, &StateCell::new());

        assert_eq!(outcome.frames, 7);
        // ticks 0, 3, 6
        assert_eq!(outcome.estimates, 3);
        assert_eq!(rx.try_iter().count(), 3);
    }

    #[test]
    fn stall_fails_but_still_flushes() {
        let dir = tempdir().unwrap();
        let (w, _rx) = worker(dir.path(), 1);
        let state = StateCell::new();
        let source = ScriptedSource {
            steps: VecDeque::from([Step::Frame(0.1), Step::Stall]),
            token: None,
            closed: Default::default(),
        };

        let outcome = w.run(move || Ok(source), &CancelToken::new(), &state);

        assert!(matches!(
            outcome.error,
            Some(WorkerError::Capture(CaptureError::Timeout(_)))
        ));
        assert_eq!(state.get(), WorkerState::Failed);
        assert_eq!(read_wav(outcome.recording.as_ref().unwrap()).len(), FRAME);
    }

    #[test]
    fn open_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let (w, _rx) = worker(&dir.path().join("rec"), 1);
        let state = StateCell::new();

        let outcome = w.run(
            || Err::<ScriptedSource, _>(CaptureError::NoDevice),
            &CancelToken::new(),
            &state,
        );

        assert_eq!(state.get(), WorkerState::Failed);
        assert!(outcome.recording.is_none());
        assert!(!dir.path().join("rec").exists());
    }

    #[test]
    fn spawned_worker_stops_on_cancel() {
        let dir = tempdir().unwrap();
        let (w, rx) = worker(dir.path(), 1);
        let handle = w
            .spawn(|| {
                Ok(ScriptedSource {
                    steps: (0..10_000).map(|_| Step::Frame(0.2)).collect(),
                    token: None,
                    closed: Default::default(),
                })
            })
            .unwrap();

        // Wait for the first estimate so the worker is definitely running.
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        let outcome = handle.stop().unwrap();
        assert!(outcome.frames >= 1);
        assert!(outcome.recording.is_some());
    }
}
