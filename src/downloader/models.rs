// Common data models for the downloader and encoder

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::errors::DownloadError;
use super::platform::Platform;

/// Container the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mp3,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Mp3)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" | "video" => Ok(Self::Mp4),
            "mp3" | "audio" => Ok(Self::Mp3),
            other => Err(DownloadError::InvalidEditParams(format!(
                "unknown output format `{}` (expected mp4 or mp3)",
                other
            ))),
        }
    }
}

/// Quality selector: let yt-dlp pick, or a resolution label such as "720p"
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Auto,
    Label(String),
}

impl Quality {
    pub const AUTO_LABEL: &'static str = "auto";

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Label(l) => Some(l),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str(Self::AUTO_LABEL),
            Self::Label(l) => f.write_str(l),
        }
    }
}

impl FromStr for Quality {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(Self::AUTO_LABEL) {
            Ok(Self::Auto)
        } else {
            Ok(Self::Label(s.to_string()))
        }
    }
}

/// One download request. Built once, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    pub url: String,
    pub platform: Platform,
    pub format: OutputFormat,
    pub quality: Quality,
    pub output_dir: PathBuf,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    /// Target is a TikTok live broadcast
    pub live: bool,
    /// Concrete format id resolved from `yt-dlp -F`
    pub format_id: Option<String>,
}

impl DownloadSpec {
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        let url = url.into();
        let platform = super::platform::classify(&url);
        let live = super::platform::is_short_form_live_url(&url);
        Self {
            url,
            platform,
            format: OutputFormat::Mp4,
            quality: Quality::Auto,
            output_dir: output_dir.into(),
            embed_metadata: false,
            embed_thumbnail: false,
            live,
            format_id: None,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_embed_metadata(mut self, enabled: bool) -> Self {
        self.embed_metadata = enabled;
        self
    }

    pub fn with_embed_thumbnail(mut self, enabled: bool) -> Self {
        self.embed_thumbnail = enabled;
        self
    }

    pub fn with_format_id(mut self, format_id: Option<String>) -> Self {
        self.format_id = format_id;
        self
    }
}

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// None when the process was killed or never started
    pub exit_code: Option<i32>,
    pub line_count: usize,
    pub status: ProcessStatus,
}

impl ProcessResult {
    pub fn from_exit(code: Option<i32>, line_count: usize) -> Self {
        let status = if code == Some(0) {
            ProcessStatus::Success
        } else {
            ProcessStatus::Failure
        };
        Self {
            exit_code: code,
            line_count,
            status,
        }
    }

    pub fn spawn_failed(line_count: usize) -> Self {
        Self {
            exit_code: Some(-1),
            line_count,
            status: ProcessStatus::Failure,
        }
    }

    pub fn timed_out(line_count: usize) -> Self {
        Self {
            exit_code: None,
            line_count,
            status: ProcessStatus::Timeout,
        }
    }

    pub fn success(&self) -> bool {
        self.status == ProcessStatus::Success
    }
}

/// What the quality probe found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Always starts with "auto"
    pub qualities: Vec<String>,
    /// True when the default ladder was used instead of real formats
    pub fell_back: bool,
}

/// Position in a media file, accepted as `H:MM:SS`, `H:MM:SS.mmm` or plain seconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Timestamp(pub Duration);

impl Timestamp {
    /// Negative values clamp to zero, values past `Duration::MAX` saturate.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX))
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = self.0.as_millis();
        let h = total_ms / 3_600_000;
        let m = (total_ms / 60_000) % 60;
        let s = (total_ms / 1000) % 60;
        let ms = total_ms % 1000;
        write!(f, "{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
    }
}

fn parse_digits(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// `.mmm` style fraction as nanoseconds, at most nine digits
fn parse_fraction(field: &str) -> Option<u32> {
    if field.len() > 9 {
        return None;
    }
    let digits = parse_digits(field)?;
    let scale = 10u64.pow(9 - field.len() as u32);
    u32::try_from(digits * scale).ok()
}

impl FromStr for Timestamp {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || {
            DownloadError::InvalidEditParams(format!(
                "time `{}` must be H:MM:SS, H:MM:SS.mmm or seconds",
                s
            ))
        };

        if !s.contains(':') {
            let secs: f64 = s.parse().map_err(|_| invalid())?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(invalid());
            }
            return Duration::try_from_secs_f64(secs)
                .map(Self)
                .map_err(|_| invalid());
        }

        let mut fields = s.split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid());
        };

        let (whole, fraction) = match sec.split_once('.') {
            Some((whole, fraction)) => (whole, parse_fraction(fraction).ok_or_else(invalid)?),
            None => (sec, 0),
        };

        let hours = parse_digits(h).ok_or_else(invalid)?;
        let minutes = parse_digits(m).filter(|&v| v < 60).ok_or_else(invalid)?;
        let seconds = parse_digits(whole).filter(|&v| v < 60).ok_or_else(invalid)?;

        let total = hours
            .checked_mul(3600)
            .and_then(|v| v.checked_add(minutes * 60 + seconds))
            .ok_or_else(invalid)?;
        Ok(Self(Duration::new(total, fraction)))
    }
}

/// Spatial crop rectangle, `W:H:X:Y`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

impl FromStr for Crop {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            DownloadError::InvalidEditParams(format!(
                "crop `{}` must be W:H:X:Y with positive width and height",
                s
            ))
        };

        let parts: Vec<i64> = s
            .trim()
            .split(':')
            .map(|p| p.trim().parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;

        match parts.as_slice() {
            &[w, h, x, y] if w > 0 && h > 0 && x >= 0 && y >= 0 => Ok(Self {
                width: u32::try_from(w).map_err(|_| invalid())?,
                height: u32::try_from(h).map_err(|_| invalid())?,
                x: u32::try_from(x).map_err(|_| invalid())?,
                y: u32::try_from(y).map_err(|_| invalid())?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// Scale target, `W:H` (also accepts `WxH`); -1/-2 keep aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub width: i32,
    pub height: i32,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for Scale {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || DownloadError::InvalidEditParams(format!("scale `{}` must be W:H or WxH", s));

        let normalized = s.trim().replace(['x', 'X'], ":");
        let (w, h) = normalized.split_once(':').ok_or_else(invalid)?;
        let width: i32 = w.trim().parse().map_err(|_| invalid())?;
        let height: i32 = h.trim().parse().map_err(|_| invalid())?;

        let valid = |v: i32| v > 0 || v == -1 || v == -2;
        if !valid(width) || !valid(height) || (width < 0 && height < 0) {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}
