use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::downloader::errors::DownloadError;
use crate::logging::LogMode;

pub const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_DIR: &str = "clipfetch";

/// User settings, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    /// Bundled yt-dlp / ffmpeg directory
    pub tools_dir: Option<PathBuf>,
    /// Program that opens a file in the preview player
    pub player: String,
    /// `host:port` of the remote control server; the client stays off when unset
    pub control_server: Option<String>,
    pub log_mode: LogMode,
    pub log_dir: Option<PathBuf>,
    pub probe_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            embed_metadata: false,
            embed_thumbnail: false,
            tools_dir: default_tools_dir(),
            player: "vlc".to_string(),
            control_server: None,
            log_mode: LogMode::Concise,
            log_dir: dirs::data_local_dir().map(|d| d.join(APP_DIR)),
            probe_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, DownloadError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_settings_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| DownloadError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
            .map_err(|e| DownloadError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn save(&self, path: &Path) -> Result<(), DownloadError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)
            .map_err(|e| DownloadError::Config(format!("failed to serialize settings: {}", e)))?;
        std::fs::write(path, payload)?;
        Ok(())
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(SETTINGS_FILE_NAME))
}

/// `<exe dir>/tools`, where release bundles ship yt-dlp and ffmpeg
fn default_tools_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("tools")))
}
