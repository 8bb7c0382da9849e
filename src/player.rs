//! Preview playback.
//!
//! The playback engine is an explicitly owned handle: whoever needs preview
//! (the front end, the load step chained after a conversion) is handed one.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::downloader::errors::DownloadError;

pub trait PlaybackEngine: Send {
    /// Open `path`, replacing whatever was loaded before.
    fn load(&mut self, path: &Path) -> Result<(), DownloadError>;

    /// File currently loaded, if any
    fn current(&self) -> Option<&Path>;

    fn stop(&mut self);
}

/// Plays through an external program (VLC by default), one instance at a time.
pub struct ExternalPlayer {
    program: PathBuf,
    child: Option<Child>,
    current: Option<PathBuf>,
}

impl ExternalPlayer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            child: None,
            current: None,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl PlaybackEngine for ExternalPlayer {
    fn load(&mut self, path: &Path) -> Result<(), DownloadError> {
        if !path.is_file() {
            return Err(DownloadError::Io(format!(
                "cannot play {}: file not found",
                path.display()
            )));
        }

        self.stop();

        let child = Command::new(&self.program)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                DownloadError::ExecutionError(format!(
                    "failed to start player {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        tracing::info!(player = %self.program.display(), file = %path.display(), "loaded into player");
        self.child = Some(child);
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "player already exited");
            }
        }
        self.current = None;
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
