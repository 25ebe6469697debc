//! Song preparation: URL validation, download, stem separation, and the
//! offline reference-curve computation.
//!
//! Download and separation are external collaborators behind async traits
//! ([`Downloader`], [`Separator`]); the default implementations shell out to
//! `yt-dlp` and `demucs`.

pub mod download;
pub mod job;
pub mod separate;
pub mod url;

use std::path::PathBuf;

use thiserror::Error;

use crate::pitch::ReferenceError;

pub use download::{list_songs, Downloader, YtDlpDownloader};
pub use job::{PreparationJob, PreparedSong};
pub use separate::{DemucsSeparator, Separator, Stems};
pub use url::{validate_url, UrlError, VideoUrl};

// ---------------------------------------------------------------------------
// PrepareError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Failed to download the song.")]
    DownloadFailed,

    #[error("Downloaded file has no usable name: {0}")]
    BadSongName(PathBuf),

    #[error("Failed to separate the audio: {0}")]
    Separation(String),

    #[error("Separation produced no {0} stem.")]
    MissingStem(&'static str),

    #[error("Failed to detect the pitch: {0}")]
    Reference(#[from] ReferenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
