//! Device factory used by the session controller.
//!
//! The controller never touches cpal directly: it asks an [`AudioDevices`]
//! implementation for a frame source or sink *on the worker thread*.  Tests
//! substitute scripted devices.

use std::time::Duration;

use crate::config::AudioConfig;

use super::capture::{AudioCapture, CaptureError, FrameSource};
use super::playback::{AudioSink, CpalSink, PlaybackError};

pub trait AudioDevices: Send + Sync {
    /// Open the microphone as a frame source.
    fn open_input(&self, config: &AudioConfig) -> Result<Box<dyn FrameSource>, CaptureError>;

    /// Open an output for a song with the given format.
    fn open_output(
        &self,
        sample_rate: u32,
        channels: u16,
        write_timeout: Duration,
    ) -> Result<Box<dyn AudioSink>, PlaybackError>;
}

// Compile-time assertion: Box<dyn AudioDevices> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioDevices>) {}
};

/// Default host devices via cpal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDevices;

impl AudioDevices for CpalDevices {
    fn open_input(&self, config: &AudioConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(AudioCapture::open(config)?))
    }

    fn open_output(
        &self,
        sample_rate: u32,
        channels: u16,
        write_timeout: Duration,
    ) -> Result<Box<dyn AudioSink>, PlaybackError> {
        Ok(Box::new(CpalSink::open(sample_rate, channels, write_timeout)?))
    }
}
