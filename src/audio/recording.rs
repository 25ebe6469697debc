//! Persisting microphone takes as WAV files.
//!
//! Each finished take is written as 16-bit mono PCM to
//! `<recordings_dir>/YYYYMMDDHHMMSS.wav`, stamped with local time at the
//! moment the capture worker shuts down.  A second take finished within the
//! same second is written as `YYYYMMDDHHMMSS-1.wav`, then `-2`, and so on;
//! an existing take is never overwritten.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use super::frame::{sample_to_i16, AudioFrame};

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("failed to create recordings directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write WAV file: {0}")]
    Wav(#[from] hound::Error),
}

/// File stem for a take finished at `at`.
pub fn recording_stem<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Create `<stem>.wav` in `dir`, numbering the name when it is taken.
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, File), RecordingError> {
    let mut n = 0_u32;
    loop {
        let name = if n == 0 {
            format!("{stem}.wav")
        } else {
            format!("{stem}-{n}.wav")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(source) => return Err(RecordingError::CreateFile { path, source }),
        }
    }
}

/// In-memory take: frames accumulated by the capture worker.
#[derive(Debug, Clone)]
pub struct Recording {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl Recording {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
        }
    }

    pub fn push_frame(&mut self, frame: &AudioFrame) {
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Write the take into `dir` (created if absent) under a name derived
    /// from `at`.  Returns the full path of the written file.
    pub fn save<Tz: TimeZone>(&self, dir: &Path, at: &DateTime<Tz>) -> Result<PathBuf, RecordingError>
    where
        Tz::Offset: std::fmt::Display,
    {
        fs::create_dir_all(dir).map_err(|source| RecordingError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let (path, file) = create_unique(dir, &recording_stem(at))?;
        self.write_wav(file)?;
        Ok(path)
    }

    fn write_wav(&self, file: File) -> Result<(), hound::Error> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::new(BufWriter::new(file), spec)?;
        for &s in &self.samples {
            writer.write_sample(sample_to_i16(s))?;
        }
        writer.finalize()
    }
}
