//! Song download collaborator.
//!
//! [`Downloader`] fetches the audio of a validated URL and converts it to
//! WAV.  Failure is not an error type: the collaborator logs it and returns
//! `None`, and the preparation flow stops with a status message.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::url::VideoUrl;

/// Extension of downloaded songs.
pub const SONG_EXTENSION: &str = "wav";

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` into `dest_dir` as a WAV file.  Returns its path, or
    /// `None` on any failure.
    async fn download(&self, url: &VideoUrl, dest_dir: &Path) -> Option<PathBuf>;
}

// Compile-time assertion: Box<dyn Downloader> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Downloader>) {}
};

// ---------------------------------------------------------------------------
// YtDlpDownloader
// ---------------------------------------------------------------------------

/// Runs `yt-dlp -x --audio-format wav`.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: String,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(&self, url: &VideoUrl, dest_dir: &Path) -> Option<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(dest_dir).await {
            log::warn!("prepare: cannot create {}: {e}", dest_dir.display());
            return None;
        }
        log::info!("prepare: downloading {url}");

        let template = dest_dir.join("%(title)s.%(ext)s");
        let output = Command::new(&self.program)
            .arg("--no-playlist")
            .arg("-x")
            .args(["--audio-format", SONG_EXTENSION])
            .arg("-o")
            .arg(&template)
            .args(["--no-simulate", "--print", "after_move:filepath"])
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                log::warn!("prepare: failed to run {}: {e}", self.program);
                return None;
            }
        };
        if !output.status.success() {
            log::warn!(
                "prepare: {} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        let path = last_line(&String::from_utf8_lossy(&output.stdout)).map(PathBuf::from)?;
        if !path.is_file() {
            log::warn!("prepare: downloader reported missing file {}", path.display());
            return None;
        }
        log::info!("prepare: downloaded {}", path.display());
        Some(path)
    }
}

fn last_line(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// File names of the downloaded songs in `dir`, sorted.  A missing
/// directory yields an empty list.
pub fn list_songs(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == SONG_EXTENSION))
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_owned))
        .collect();
    names.sort();
    names
}
