//! Song preparation flow.
//!
//! ```text
//! validate_url ─▶ Downloader ─▶ Separator ─▶ ReferenceCurve::compute_from_wav ─▶ <results>/<song>.csv
//! ```
//!
//! Every step writes a status line into [`SharedState`] so the sidebar can
//! show progress.  Any failure stops the flow; nothing is retried.
//!
//! [`PreparationJob::submit`] checks the URL on the caller's thread; a
//! malformed URL only changes the status line and never starts a job.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::pipeline::{with_state, SharedState};
use crate::pitch::ReferenceCurve;

use super::download::Downloader;
use super::separate::{Separator, VOCALS};
use super::url::{validate_url, UrlError, VideoUrl};
use super::PrepareError;

/// Artifacts of a successful preparation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSong {
    /// Song identifier: the downloaded file's stem.
    pub name: String,
    pub song: PathBuf,
    pub vocals: PathBuf,
    pub reference: PathBuf,
}

pub struct PreparationJob {
    config: AppConfig,
    downloader: Arc<dyn Downloader>,
    separator: Arc<dyn Separator>,
    state: SharedState,
}

impl PreparationJob {
    pub fn new(
        config: AppConfig,
        downloader: Arc<dyn Downloader>,
        separator: Arc<dyn Separator>,
        state: SharedState,
    ) -> Self {
        Self {
            config,
            downloader,
            separator,
            state,
        }
    }

    /// Validate `raw_url`, then run the flow for it on `runtime`.
    pub fn submit(
        self: &Arc<Self>,
        raw_url: &str,
        runtime: &Handle,
    ) -> Result<JoinHandle<Result<PreparedSong, PrepareError>>, UrlError> {
        let url = match validate_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("prepare: {e}");
                with_state(&self.state, |st| st.status = e.to_string());
                return Err(e);
            }
        };
        let job = Arc::clone(self);
        Ok(runtime.spawn(async move { job.run(url).await }))
    }

    /// Run the whole flow for `url`.  The outcome is also reflected in the
    /// shared status line.
    pub async fn run(&self, url: VideoUrl) -> Result<PreparedSong, PrepareError> {
        with_state(&self.state, |st| {
            st.preparing = true;
            st.error_message = None;
        });
        let result = self.prepare(&url).await;
        with_state(&self.state, |st| {
            st.preparing = false;
            if let Err(e) = &result {
                st.status = e.to_string();
            }
        });
        match &result {
            Ok(song) => log::info!("prepare: {} ready", song.name),
            Err(e) => log::warn!("prepare: {e}"),
        }
        result
    }

    async fn prepare(&self, url: &VideoUrl) -> Result<PreparedSong, PrepareError> {
        let storage = &self.config.storage;

        self.status("Downloading the song...");
        let song = self
            .downloader
            .download(url, &storage.downloads_dir)
            .await
            .ok_or(PrepareError::DownloadFailed)?;
        self.status("Downloaded the song successfully!");

        let name = song
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_owned)
            .ok_or_else(|| PrepareError::BadSongName(song.clone()))?;

        self.status("Separating the audio...");
        let stems = self
            .separator
            .separate(&song, &storage.separated_dir.join(&name))
            .await?;
        let vocals = stems
            .get(VOCALS)
            .cloned()
            .ok_or(PrepareError::MissingStem(VOCALS))?;
        self.status("Separated the audio successfully!");

        self.status("Detecting the pitch...");
        let reference = ReferenceCurve::path_for(&storage.results_dir, &name);
        let analysis_rate = self.config.audio.sample_rate;
        let estimator = self.config.estimator.clone();
        let resolution = self.config.comparison.reference_resolution();
        let (vocals_path, reference_path) = (vocals.clone(), reference.clone());
        tokio::task::spawn_blocking(move || {
            let curve =
                ReferenceCurve::compute_from_wav(&vocals_path, analysis_rate, &estimator, resolution)?;
            curve.save(&reference_path)?;
            log::info!(
                "prepare: wrote {} reference row(s) to {}",
                curve.len(),
                reference_path.display()
            );
            Ok::<_, PrepareError>(())
        })
        .await??;
        self.status("Detected the pitch successfully!");

        Ok(PreparedSong {
            name,
            song,
            vocals,
            reference,
        })
    }

    fn status(&self, message: &str) {
        log::info!("prepare: {message}");
        with_state(&self.state, |st| st.status = message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
