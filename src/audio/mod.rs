//! Audio I/O: microphone capture, song playback, recordings, and buffers.
//!
//! # Capture path
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → stereo_to_mono
//!           → StreamResampler → AudioFrame (fixed size) → FrameSource::read_frame
//! ```
//!
//! # Playback path
//!
//! ```text
//! WavSource::next_block → AudioSink::write_block → ringbuf → cpal callback → speakers
//! ```

pub mod buffer;
pub mod capture;
pub mod devices;
pub mod frame;
pub mod playback;
pub mod recording;
pub mod resample;

pub use buffer::RingBuffer;
pub use capture::{AudioCapture, AudioChunk, CaptureError, FrameSource, StreamHandle};
pub use devices::{AudioDevices, CpalDevices};
pub use frame::AudioFrame;
pub use playback::{AudioSink, CpalSink, PlaybackError, WavSource};
pub use recording::{recording_stem, Recording, RecordingError};
pub use resample::{mono_to_channels, resample_offline, stereo_to_mono, StreamResampler};
