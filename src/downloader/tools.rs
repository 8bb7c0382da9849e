use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ToolKind {
    YtDlp,
    Ffmpeg,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::Ffmpeg => "ffmpeg",
        }
    }

    /// Environment variable that pins the executable path
    pub fn env_var(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "CLIPFETCH_YTDLP",
            ToolKind::Ffmpeg => "CLIPFETCH_FFMPEG",
        }
    }

    pub fn version_arg(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "--version",
            ToolKind::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }

    fn binary_name(&self) -> String {
        format!("{}{}", self.as_str(), std::env::consts::EXE_SUFFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub kind: ToolKind,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Locates yt-dlp and ffmpeg and builds the environment children run with
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    tools_dir: Option<PathBuf>,
    overrides: HashMap<ToolKind, PathBuf>,
}

impl ToolManager {
    /// `tools_dir` is the bundled tool directory; env overrides are read once here.
    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        let mut overrides = HashMap::new();
        for kind in [ToolKind::YtDlp, ToolKind::Ffmpeg] {
            if let Some(path) = std::env::var_os(kind.env_var()).filter(|p| !p.is_empty()) {
                overrides.insert(kind, PathBuf::from(path));
            }
        }
        Self {
            tools_dir,
            overrides,
        }
    }

    pub fn with_override(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(kind, path.into());
        self
    }

    pub fn tools_dir(&self) -> Option<&Path> {
        self.tools_dir.as_deref()
    }

    /// Path to run `kind` with. Never fails: when nothing is found the bare
    /// binary name is returned and left to the OS search path.
    pub fn resolve(&self, kind: ToolKind) -> PathBuf {
        self.locate(kind)
            .unwrap_or_else(|| PathBuf::from(kind.binary_name()))
    }

    /// Env override, then bundled copy, then common install paths, then `which`.
    pub fn locate(&self, kind: ToolKind) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(&kind) {
            return Some(path.clone());
        }

        let binary_name = kind.binary_name();

        if let Some(dir) = &self.tools_dir {
            let bundled = dir.join(&binary_name);
            if bundled.exists() {
                return Some(bundled);
            }
        }

        let common_paths = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];
        for dir in common_paths {
            let path = Path::new(dir).join(&binary_name);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(output) = Command::new("which").arg(&binary_name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(PathBuf::from(path));
                }
            }
        }

        None
    }

    /// `PATH` with the bundled directory and the resolved ffmpeg directory in front,
    /// so yt-dlp's post-processing finds the same ffmpeg we do.
    pub fn search_path(&self) -> OsString {
        let mut dirs: Vec<PathBuf> = Vec::new();
        if let Some(dir) = &self.tools_dir {
            dirs.push(dir.clone());
        }
        if let Some(ffmpeg_dir) = self
            .locate(ToolKind::Ffmpeg)
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
        {
            if !dirs.contains(&ffmpeg_dir) {
                dirs.push(ffmpeg_dir);
            }
        }

        let existing = std::env::var_os("PATH").unwrap_or_default();
        dirs.extend(std::env::split_paths(&existing));
        std::env::join_paths(dirs).unwrap_or(existing)
    }

    pub fn get_tool_info(&self, kind: ToolKind) -> ToolInfo {
        let path = self.locate(kind);
        let version = path.as_deref().and_then(|p| get_version(p, kind));

        ToolInfo {
            name: kind.as_str().to_string(),
            kind,
            is_available: version.is_some(),
            version,
            path: path.map(|p| p.display().to_string()),
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolKind::YtDlp),
            self.get_tool_info(ToolKind::Ffmpeg),
        ]
    }
}

fn get_version(path: &Path, kind: ToolKind) -> Option<String> {
    match Command::new(path).arg(kind.version_arg()).output() {
        Ok(output) if output.status.success() => {
            // ffmpeg prints a banner; the first line carries the version
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|l| l.trim().to_string())
        }
        _ => None,
    }
}
