//! Song playback: WAV decoding and the output-device sink.
//!
//! [`WavSource`] reads a song block by block with `hound`.  [`AudioSink`] is
//! the seam the playback worker writes to; [`CpalSink`] implements it on the
//! system default output device, feeding the cpal callback through a
//! lock-free `ringbuf` so that [`AudioSink::write_block`] blocks (with a
//! timeout) exactly like a blocking stream write.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{SampleFormat, WavReader};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use thiserror::Error;

use super::resample::{mono_to_channels, stereo_to_mono, StreamResampler};

/// Interleaved samples buffered between the worker and the device callback
/// (about 0.75 s of 44.1 kHz stereo).
const RING_CAPACITY: usize = 65_536;

/// Poll interval while the ring buffer is full.
const WRITE_POLL: Duration = Duration::from_millis(2);

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to open song: {0}")]
    Wav(#[from] hound::Error),

    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The device did not accept a block within the write timeout.
    #[error("output device did not accept audio within {0:?}")]
    Timeout(Duration),

    #[error("output sink already closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// WavSource
// ---------------------------------------------------------------------------

/// Block-wise reader for a WAV song, yielding interleaved `f32` samples.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    sample_rate: u32,
    channels: u16,
    /// Divisor mapping integer PCM to `[-1.0, 1.0]`.
    scale: f32,
    format: SampleFormat,
}

impl WavSource {
    pub fn open(path: &Path) -> Result<Self, PlaybackError> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let scale = match spec.sample_format {
            SampleFormat::Float => 1.0,
            SampleFormat::Int => (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32,
        };
        Ok(Self {
            reader,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            scale,
            format: spec.sample_format,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total length of the song.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.reader.duration() as f64 / self.sample_rate as f64)
    }

    /// Read up to `frames` frames (`frames * channels` samples).
    ///
    /// Returns `Ok(None)` once the song is exhausted.
    pub fn next_block(&mut self, frames: usize) -> Result<Option<Vec<f32>>, PlaybackError> {
        let wanted = frames * self.channels as usize;
        let mut block = Vec::with_capacity(wanted);
        match self.format {
            SampleFormat::Float => {
                for s in self.reader.samples::<f32>().take(wanted) {
                    block.push(s?);
                }
            }
            SampleFormat::Int => {
                let scale = self.scale;
                for s in self.reader.samples::<i32>().take(wanted) {
                    block.push(s? as f32 / scale);
                }
            }
        }
        Ok(if block.is_empty() { None } else { Some(block) })
    }

    /// Decode the remainder of the song as mono samples.
    pub fn read_all_mono(&mut self) -> Result<Vec<f32>, PlaybackError> {
        let mut mono = Vec::new();
        while let Some(block) = self.next_block(4096)? {
            mono.extend(stereo_to_mono(&block, self.channels));
        }
        Ok(mono)
    }
}

// ---------------------------------------------------------------------------
// AudioSink
// ---------------------------------------------------------------------------

/// Destination for interleaved playback blocks.
pub trait AudioSink {
    /// Write one block, blocking until the device has room for all of it.
    fn write_block(&mut self, block: &[f32]) -> Result<(), PlaybackError>;

    /// Stop the output.  With `drain`, audio already written is allowed to
    /// finish playing first.
    fn finish(&mut self, drain: bool);
}

impl<T: AudioSink + ?Sized> AudioSink for Box<T> {
    fn write_block(&mut self, block: &[f32]) -> Result<(), PlaybackError> {
        (**self).write_block(block)
    }

    fn finish(&mut self, drain: bool) {
        (**self).finish(drain)
    }
}

// ---------------------------------------------------------------------------
// ChannelAdapter
// ---------------------------------------------------------------------------

/// Converts song-format blocks to the device format when they differ.
struct ChannelAdapter {
    source_channels: u16,
    device_channels: u16,
    resampler: StreamResampler,
}

impl ChannelAdapter {
    fn is_identity(&self) -> bool {
        self.source_channels == self.device_channels && self.resampler.is_passthrough()
    }

    fn adapt(&mut self, block: &[f32]) -> Vec<f32> {
        if self.is_identity() {
            return block.to_vec();
        }
        let mono = stereo_to_mono(block, self.source_channels);
        let resampled = self.resampler.process(&mono);
        mono_to_channels(&resampled, self.device_channels)
    }
}

// ---------------------------------------------------------------------------
// CpalSink
// ---------------------------------------------------------------------------

/// Output sink on the system default output device.
///
/// Like [`AudioCapture`](super::AudioCapture), the underlying stream is not
/// `Send`; open it on the thread that writes to it.
pub struct CpalSink {
    stream: Option<cpal::Stream>,
    producer: HeapProd<f32>,
    adapter: ChannelAdapter,
    write_timeout: Duration,
}

impl CpalSink {
    /// Open the default output device for a song with the given format.
    ///
    /// The song's own rate and channel count are used when the device
    /// supports them; otherwise the device default is used and blocks are
    /// converted on the fly.
    pub fn open(
        source_rate: u32,
        source_channels: u16,
        write_timeout: Duration,
    ) -> Result<Self, PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(PlaybackError::NoDevice)?;

        let stream_config = match matching_output_config(&device, source_rate, source_channels) {
            Some(config) => config,
            None => device.default_output_config()?.into(),
        };
        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;

        let (producer, mut consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();
        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let n = consumer.pop_slice(data);
                data[n..].fill(0.0);
            },
            |err: cpal::StreamError| {
                log::error!("playback: cpal stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        log::info!(
            "playback: output opened ({device_rate} Hz, {device_channels} ch) for song \
             ({source_rate} Hz, {source_channels} ch)"
        );

        Ok(Self {
            stream: Some(stream),
            producer,
            adapter: ChannelAdapter {
                source_channels,
                device_channels,
                resampler: StreamResampler::new(source_rate, device_rate),
            },
            write_timeout,
        })
    }
}

/// A stream config using the song's own format, if the device supports it.
fn matching_output_config(
    device: &cpal::Device,
    rate: u32,
    channels: u16,
) -> Option<cpal::StreamConfig> {
    let mut configs = device.supported_output_configs().ok()?;
    configs
        .find(|range| {
            range.channels() == channels
                && range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
        })
        .map(|range| range.with_sample_rate(cpal::SampleRate(rate)).into())
}

impl AudioSink for CpalSink {
    fn write_block(&mut self, block: &[f32]) -> Result<(), PlaybackError> {
        if self.stream.is_none() {
            return Err(PlaybackError::Closed);
        }
        let data = self.adapter.adapt(block);
        let deadline = Instant::now() + self.write_timeout;
        let mut written = 0;
        while written < data.len() {
            written += self.producer.push_slice(&data[written..]);
            if written == data.len() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(PlaybackError::Timeout(self.write_timeout));
            }
            thread::sleep(WRITE_POLL);
        }
        Ok(())
    }

    fn finish(&mut self, drain: bool) {
        if drain {
            let deadline = Instant::now() + self.write_timeout;
            while !self.producer.is_empty() && Instant::now() < deadline {
                thread::sleep(WRITE_POLL);
            }
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("playback: pause on close failed: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
