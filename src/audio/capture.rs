//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle and turns the
//! device's variable-sized callbacks into fixed-size mono [`AudioFrame`]s at
//! the configured analysis rate.  It implements [`FrameSource`], the seam the
//! capture worker reads from; tests substitute scripted sources.
//!
//! `cpal::Stream` is not `Send` on every platform, so an `AudioCapture` must
//! be opened on the thread that reads from it.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::frame::AudioFrame;
use super::resample::{stereo_to_mono, StreamResampler};
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening or reading the microphone.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// No complete frame arrived within the read timeout.
    #[error("no audio frame within {0:?}; input device stalled")]
    Timeout(Duration),

    /// The stream was closed or its callback went away.
    #[error("input stream closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

/// Anything that yields fixed-size mono frames.
pub trait FrameSource {
    /// Block until one full frame is available or `timeout` elapses.
    fn read_frame(&mut self, timeout: Duration) -> Result<AudioFrame, CaptureError>;

    /// Sample rate of the frames this source yields.
    fn sample_rate(&self) -> u32;

    /// Release the underlying device.  Further reads fail with
    /// [`CaptureError::Closed`].
    fn close(&mut self) {}
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read_frame(&mut self, timeout: Duration) -> Result<AudioFrame, CaptureError> {
        (**self).read_frame(timeout)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

/// Collects device chunks into fixed-size mono frames at the target rate.
#[derive(Debug)]
struct FrameAssembler {
    frame_size: usize,
    target_rate: u32,
    resampler: Option<StreamResampler>,
    pending: Vec<f32>,
}

impl FrameAssembler {
    fn new(frame_size: usize, target_rate: u32) -> Self {
        Self {
            frame_size,
            target_rate,
            resampler: None,
            pending: Vec::with_capacity(frame_size * 2),
        }
    }

    fn push_chunk(&mut self, chunk: &AudioChunk) {
        let mono = stereo_to_mono(&chunk.samples, chunk.channels);
        let target_rate = self.target_rate;
        let resampler = self
            .resampler
            .get_or_insert_with(|| StreamResampler::new(chunk.sample_rate, target_rate));
        let resampled = resampler.process(&mono);
        self.pending.extend_from_slice(&resampled);
    }

    fn take_frame(&mut self) -> Option<AudioFrame> {
        if self.pending.len() < self.frame_size {
            return None;
        }
        let rest = self.pending.split_off(self.frame_size);
        let samples = std::mem::replace(&mut self.pending, rest);
        Some(AudioFrame::new(samples, self.target_rate))
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value stops the underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture on the system default input device.
///
/// ```rust,no_run
/// use pitch_practice::audio::{AudioCapture, FrameSource};
/// use pitch_practice::config::AudioConfig;
///
/// let config = AudioConfig::default();
/// let mut capture = AudioCapture::open(&config).unwrap();
/// let frame = capture.read_frame(config.read_timeout()).unwrap();
/// assert_eq!(frame.len(), config.frame_size);
/// capture.close();
/// ```
pub struct AudioCapture {
    stream: Option<StreamHandle>,
    rx: mpsc::Receiver<AudioChunk>,
    assembler: FrameAssembler,
}

impl AudioCapture {
    /// Open the default input device and start streaming.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] when no input device exists, or a cpal
    /// configuration/stream error when the device rejects the stream.
    pub fn open(config: &AudioConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let device_channels = supported.channels();
        let device_rate = supported.sample_rate().0;
        let stream_config: cpal::StreamConfig = supported.into();

        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate: device_rate,
                    channels: device_channels,
                };
                // The reader may already be gone during shutdown.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("capture: cpal stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        log::info!(
            "capture: input opened ({device_rate} Hz, {device_channels} ch) → {} Hz frames of {}",
            config.sample_rate,
            config.frame_size
        );

        Ok(Self {
            stream: Some(StreamHandle { _stream: stream }),
            rx,
            assembler: FrameAssembler::new(config.frame_size, config.sample_rate),
        })
    }
}

impl FrameSource for AudioCapture {
    fn read_frame(&mut self, timeout: Duration) -> Result<AudioFrame, CaptureError> {
        if self.stream.is_none() {
            return Err(CaptureError::Closed);
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.assembler.take_frame() {
                return Ok(frame);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.assembler.push_chunk(&chunk),
                Err(mpsc::RecvTimeoutError::Timeout) => return Err(CaptureError::Timeout(timeout)),
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(CaptureError::Closed),
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.assembler.target_rate
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("capture: input stream closed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    fn chunk(samples: Vec<f32>, sample_rate: u32, channels: u16) -> AudioChunk {
        AudioChunk {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn assembler_waits_for_a_full_frame() {
        let mut asm = FrameAssembler::new(4, 16_000);
        asm.push_chunk(&chunk(vec![0.1, 0.2, 0.3], 16_000, 1));
        assert!(asm.take_frame().is_none());

        asm.push_chunk(&chunk(vec![0.4, 0.5], 16_000, 1));
        let frame = asm.take_frame().expect("frame");
        assert_eq!(frame.samples, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(frame.sample_rate, 16_000);
        // 0.5 stays pending for the next frame
        assert!(asm.take_frame().is_none());
    }

    #[test]
    fn assembler_downmixes_stereo() {
        let mut asm = FrameAssembler::new(2, 16_000);
        asm.push_chunk(&chunk(vec![1.0, 0.0, 0.5, 0.5], 16_000, 2));
        let frame = asm.take_frame().expect("frame");
        assert_eq!(frame.samples, vec![0.5, 0.5]);
    }

    #[test]
    fn assembler_resamples_to_target_rate() {
        let mut asm = FrameAssembler::new(160, 16_000);
        // 10 ms at 48 kHz plus one extra sample for interpolation
        asm.push_chunk(&chunk(vec![0.2; 481], 48_000, 1));
        let frame = asm.take_frame().expect("frame");
        assert_eq!(frame.len(), 160);
        assert!(frame.samples.iter().all(|s| (s - 0.2).abs() < 1e-5));
    }
}
