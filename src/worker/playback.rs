//! Song playback worker.
//!
//! Streams a WAV file to an [`AudioSink`] block by block.  The instant
//! playback starts is sent on a single-value channel *before* the first
//! block is written, so the controller's elapsed-time clock never runs ahead
//! of the audio.

use std::path::PathBuf;
use std::sync::mpsc::{SyncSender, TrySendError};
use std::time::Instant;

use crate::audio::{AudioSink, PlaybackError, WavSource};

use super::cancel::CancelToken;
use super::handle::WorkerHandle;
use super::state::{StateCell, WorkerKind, WorkerState};
use super::WorkerError;

/// What a finished playback worker reports back.
#[derive(Debug, Default)]
pub struct PlaybackOutcome {
    /// Blocks written to the sink.
    pub blocks: usize,
    /// `true` when the whole file was played.
    pub completed: bool,
    pub error: Option<WorkerError>,
}

/// Configured playback worker, ready to spawn.
pub struct PlaybackWorker {
    path: PathBuf,
    block_frames: usize,
    started: SyncSender<Instant>,
}

impl PlaybackWorker {
    pub fn new(path: PathBuf, block_frames: usize, started: SyncSender<Instant>) -> Self {
        Self {
            path,
            block_frames: block_frames.max(1),
            started,
        }
    }

    /// Start the worker thread.  `open_sink` runs on that thread with the
    /// song's sample rate and channel count.
    pub fn spawn<F, K>(self, open_sink: F) -> Result<WorkerHandle<PlaybackOutcome>, WorkerError>
    where
        F: FnOnce(u32, u16) -> Result<K, PlaybackError> + Send + 'static,
        K: AudioSink,
    {
        WorkerHandle::spawn(WorkerKind::Playback, move |token, state| {
            self.run(open_sink, &token, &state)
        })
    }

    fn run<F, K>(self, open_sink: F, token: &CancelToken, state: &StateCell) -> PlaybackOutcome
    where
        F: FnOnce(u32, u16) -> Result<K, PlaybackError>,
        K: AudioSink,
    {
        let opened = WavSource::open(&self.path)
            .and_then(|source| {
                let sink = open_sink(source.sample_rate(), source.channels())?;
                Ok((source, sink))
            });
        let (mut source, mut sink) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                // Dropping `started` unsent tells the controller we never began.
                log::error!("playback: failed to open {}: {e}", self.path.display());
                state.set(WorkerState::Failed);
                return PlaybackOutcome {
                    error: Some(e.into()),
                    ..PlaybackOutcome::default()
                };
            }
        };

        state.set(WorkerState::Running);
        log::info!(
            "playback: playing {} ({:.1} s)",
            self.path.display(),
            source.duration().as_secs_f64()
        );

        match self.started.try_send(Instant::now()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::warn!("playback: start time already reported"),
            Err(TrySendError::Disconnected(_)) => log::debug!("playback: nobody awaits start time"),
        }

        let mut outcome = PlaybackOutcome::default();
        loop {
            let block = match source.next_block(self.block_frames) {
                Ok(Some(block)) => block,
                Ok(None) => {
                    outcome.completed = true;
                    break;
                }
                Err(e) => {
                    log::error!("playback: decode failed: {e}");
                    outcome.error = Some(e.into());
                    break;
                }
            };
            if let Err(e) = sink.write_block(&block) {
                log::error!("playback: write failed: {e}");
                outcome.error = Some(e.into());
                break;
            }
            outcome.blocks += 1;
            if token.is_cancelled() {
                break;
            }
        }

        state.set(WorkerState::Stopping);
        sink.finish(outcome.completed);
        log::info!(
            "playback: {} after {} block(s)",
            if outcome.completed { "finished" } else { "stopped" },
            outcome.blocks
        );

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
    use std::path::Path;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct SinkLog {
        blocks: Vec<usize>,
        stamp_before_first_write: Option<bool>,
        drained: Option<bool>,
    }

    /// Sink that records what it is asked to do.  On its first write it
    /// checks whether the start time is already in the channel.
    struct RecordingSink {
        log: Arc<Mutex<SinkLog>>,
        started: Option<Receiver<Instant>>,
        cancel_after: Option<(usize, CancelToken)>,
    }

    impl AudioSink for RecordingSink {
        fn write_block(&mut self, block: &[f32]) -> Result<(), PlaybackError> {
            let mut log = self.log.lock().unwrap();
            if let Some(rx) = self.started.take() {
                log.stamp_before_first_write = Some(rx.try_recv().is_ok());
            }
            log.blocks.push(block.len());
            if let Some((n, token)) = &self.cancel_after {
                if log.blocks.len() == *n {
                    token.cancel();
                }
            }
            Ok(())
        }

        fn finish(&mut self, drain: bool) {
            self.log.lock().unwrap().drained = Some(drain);
        }
    }

    fn write_song(path: &Path, frames: usize, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames * channels as usize {
            w.write_sample((i % 100) as i16).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn start_time_is_sent_before_the_first_write() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("song.wav");
        write_song(&song, 2_500, 1);

        let (tx, rx) = mpsc::sync_channel(1);
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let sink_log = log.clone();
        let handle = PlaybackWorker::new(song, 1024, tx)
            .spawn(move |rate, channels| {
                assert_eq!((rate, channels), (16_000, 1));
                Ok(RecordingSink {
                    log: sink_log,
                    started: Some(rx),
                    cancel_after: None,
                })
            })
            .unwrap();

        let outcome = handle.join().unwrap();
        assert!(outcome.completed);
        assert!(outcome.error.is_none());

        let log = log.lock().unwrap();
        assert_eq!(log.stamp_before_first_write, Some(true));
        assert_eq!(log.blocks, vec![1024, 1024, 452]);
        assert_eq!(log.drained, Some(true));
    }

    #[test]
    fn cancel_stops_within_one_block_without_draining() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("song.wav");
        write_song(&song, 16_000, 2);

        let (tx, _rx) = mpsc::sync_channel(1);
        let token = CancelToken::new();
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let state = StateCell::new();
        let sink = RecordingSink {
            log: log.clone(),
            started: None,
            cancel_after: Some((2, token.clone())),
        };

        let outcome = PlaybackWorker::new(song, 1024, tx).run(move |_, _| Ok(sink), &token, &state);

        assert!(!outcome.completed);
        assert_eq!(outcome.blocks, 2);
        assert_eq!(state.get(), WorkerState::Terminated);
        let log = log.lock().unwrap();
        // Interleaved stereo: 1024 frames = 2048 samples.
        assert_eq!(log.blocks, vec![2048, 2048]);
        assert_eq!(log.drained, Some(false));
    }

    #[test]
    fn missing_file_fails_without_a_start_time() {
        let dir = tempdir().unwrap();
        let (tx, rx) = mpsc::sync_channel(1);
        let state = StateCell::new();

        let outcome = PlaybackWorker::new(dir.path().join("missing.wav"), 1024, tx).run(
            |_, _| -> Result<RecordingSink, PlaybackError> { panic!("sink must not be opened") },
            &CancelToken::new(),
            &state,
        );

        assert!(matches!(outcome.error, Some(WorkerError::Playback(_))));
        assert_eq!(state.get(), WorkerState::Failed);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(50)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }
}
