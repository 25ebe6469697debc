//! Source-separation collaborator.
//!
//! [`Separator`] splits a song into stems and saves each one as
//! `<out_dir>/<stem>.wav`.  Only the `"vocals"` stem is used downstream.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::PrepareError;

/// Stem consumed by the reference-curve computation.
pub const VOCALS: &str = "vocals";

/// Stem name → saved file.
pub type Stems = BTreeMap<String, PathBuf>;

#[async_trait]
pub trait Separator: Send + Sync {
    async fn separate(&self, input: &Path, out_dir: &Path) -> Result<Stems, PrepareError>;
}

// Compile-time assertion: Box<dyn Separator> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Separator>) {}
};

// ---------------------------------------------------------------------------
// DemucsSeparator
// ---------------------------------------------------------------------------

/// Runs the `demucs` command line tool.
///
/// demucs writes `<staging>/<model>/<stem>.wav`; the stems are then moved to
/// `<out_dir>/<stem>.wav` and the staging directory is removed.
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    program: String,
}

impl DemucsSeparator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DemucsSeparator {
    fn default() -> Self {
        Self::new("demucs")
    }
}

#[async_trait]
impl Separator for DemucsSeparator {
    async fn separate(&self, input: &Path, out_dir: &Path) -> Result<Stems, PrepareError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let staging = out_dir.join(".staging");

        log::info!("prepare: separating {}", input.display());
        let output = Command::new(&self.program)
            .arg("-o")
            .arg(&staging)
            .args(["--filename", "{stem}.{ext}"])
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PrepareError::Separation(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(PrepareError::Separation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let out = out_dir.to_path_buf();
        let stems = tokio::task::spawn_blocking(move || {
            let stems = collect_stems(&staging, &out)?;
            fs::remove_dir_all(&staging)?;
            Ok::<_, io::Error>(stems)
        })
        .await??;
        log::info!("prepare: saved {} stem(s) to {}", stems.len(), out_dir.display());
        Ok(stems)
    }
}

/// Move every `*.wav` below `staging` to `<out_dir>/<file name>`.
fn collect_stems(staging: &Path, out_dir: &Path) -> io::Result<Stems> {
    let mut stems = Stems::new();
    let mut pending = vec![staging.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            if !path.extension().is_some_and(|ext| ext == "wav") {
                continue;
            }
            let (Some(stem), Some(name)) = (
                path.file_stem().and_then(|s| s.to_str()).map(str::to_owned),
                path.file_name().map(ToOwned::to_owned),
            ) else {
                continue;
            };
            let dest = out_dir.join(name);
            fs::rename(&path, &dest)?;
            stems.insert(stem, dest);
        }
    }
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stems_are_flattened_into_out_dir() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join(".staging");
        fs::create_dir_all(staging.join("htdemucs")).unwrap();
        for stem in ["vocals", "drums", "bass", "other"] {
            fs::write(staging.join("htdemucs").join(format!("{stem}.wav")), b"RIFF").unwrap();
        }
        fs::write(staging.join("htdemucs").join("notes.txt"), b"").unwrap();

        let stems = collect_stems(&staging, dir.path()).unwrap();

        assert_eq!(stems.len(), 4);
        assert_eq!(stems[VOCALS], dir.path().join("vocals.wav"));
        assert!(dir.path().join("drums.wav").is_file());
    }

    #[tokio::test]
    async fn missing_program_is_a_separation_error() {
        let dir = tempdir().unwrap();
        let sep = DemucsSeparator::new("definitely-not-a-real-separator");
        let result = sep.separate(&dir.path().join("song.wav"), dir.path()).await;
        assert!(matches!(result, Err(PrepareError::Separation(_))));
    }
}
