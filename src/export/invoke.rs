//! youtube-dl invocation for a single track

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::export::ledger;
use crate::openwhyd::Track;

const DOWNLOADER_BIN: &str = "youtube-dl";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
/// youtube-dl's own substitution pattern; it picks the final file name
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Destination directory for a track, relative to the export root.
///
/// Pure function of the owner and playlist name; surrounding whitespace in
/// the playlist name is not significant.
pub fn track_dir(owner: &str, playlist_name: &str) -> PathBuf {
    Path::new(owner).join(playlist_name.trim())
}

/// What happened to a single track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Downloaded,
    /// Not a YouTube-sourced track; nothing was touched
    UnsupportedSource,
    /// Already present in the directory's ledger
    AlreadyDownloaded,
}

/// Per-track invocation failures
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to read download ledger {path}: {source}")]
    Ledger {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create {dir}: {source}")]
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to spawn downloader: {0}")]
    Spawn(std::io::Error),
    #[error("downloader exited with {0}")]
    Exit(std::process::ExitStatus),
    #[error("cancelled")]
    Cancelled,
}

impl InvokeError {
    /// Whether this failure aborts the whole run rather than just the track.
    ///
    /// An unreadable ledger means deduplication is broken for every track
    /// that follows, so it gets the same treatment as a failed fetch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, InvokeError::Ledger { .. })
    }
}

/// Seam between the worker pool and the external downloader, so pool
/// behavior is testable without spawning processes
#[async_trait]
pub trait Invoke: Send + Sync + 'static {
    async fn invoke(&self, track: &Track, cancel: &CancellationToken)
    -> Result<Outcome, InvokeError>;
}

/// Production invoker shelling out to youtube-dl
pub struct YoutubeDl {
    /// Directory the per-user folder tree is created under
    pub root: PathBuf,
    /// Mirror the tool's stdout/stderr instead of discarding them
    pub show_output: bool,
    /// Downloader binary; only tests override this
    pub program: String,
}

impl YoutubeDl {
    pub fn new(root: PathBuf, show_output: bool) -> Self {
        Self {
            root,
            show_output,
            program: DOWNLOADER_BIN.to_string(),
        }
    }
}

#[async_trait]
impl Invoke for YoutubeDl {
    async fn invoke(
        &self,
        track: &Track,
        cancel: &CancellationToken,
    ) -> Result<Outcome, InvokeError> {
        let dir = self.root.join(track_dir(&track.owner, track.playlist_name()));
        let archive = ledger::archive_path(&dir);

        // TODO: share one cached ledger between workers instead of
        // re-reading the file for every track in the same directory
        let downloaded = ledger::completed(&dir)
            .await
            .map_err(|source| InvokeError::Ledger {
                path: archive.clone(),
                source,
            })?;

        let Some(yt_id) = track.youtube_id() else {
            debug!("Skipping non-YouTube track: {}", track.name);
            return Ok(Outcome::UnsupportedSource);
        };

        if downloaded.contains(yt_id) {
            info!("Track already downloaded: {}", track.name);
            return Ok(Outcome::AlreadyDownloaded);
        }

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder
            .create(&dir)
            .await
            .map_err(|source| InvokeError::CreateDir {
                dir: dir.clone(),
                source,
            })?;

        let url = format!("{WATCH_URL}{yt_id}");

        let mut cmd = Command::new(&self.program);
        cmd.arg("--download-archive")
            .arg(&archive)
            .arg("--no-post-overwrites")
            .arg("-i")
            .arg("-x")
            .arg("-o")
            .arg(dir.join(OUTPUT_TEMPLATE))
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("320K")
            .arg(&url)
            .kill_on_drop(true);

        if self.show_output {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        debug!("Spawning {} for {}", self.program, url);
        let mut child = cmd.spawn().map_err(InvokeError::Spawn)?;

        // Cancellation is best-effort: the child is killed, but whether
        // partially written files get cleaned up is up to the tool itself.
        let status = tokio::select! {
            status = child.wait() => status.map_err(InvokeError::Spawn)?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(InvokeError::Cancelled);
            }
        };

        if !status.success() {
            return Err(InvokeError::Exit(status));
        }

        info!("Track downloaded: {}", track.name);
        Ok(Outcome::Downloaded)
    }
}
