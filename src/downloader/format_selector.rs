// FormatSelector - quality ladder and format id lookup
//
// Converts yt-dlp output into the choices offered to the user:
// - `--dump-json` metadata → title, thumbnail, bucketed resolution labels
// - `-F` listing → concrete format id for a chosen label

use regex::Regex;
use serde::Deserialize;

use super::errors::DownloadError;
use super::models::{ProbeInfo, Quality};
use super::platform::Platform;

/// Offered when the probe fails or finds no video formats
pub const DEFAULT_LADDER: &[&str] = &["auto", "1080p", "720p", "480p", "360p", "240p"];

lazy_static::lazy_static! {
    static ref FORMAT_ROW_RE: Regex = Regex::new(r"^\s*\d+\s").unwrap();
}

/// Codec tokens that identify a usable TikTok row in the `-F` table
const TIKTOK_CODEC_TOKENS: &[&str] = &["h264", "bytevc1"];

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: Option<String>,
    width: Option<u64>,
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    height: Option<u64>,
    vcodec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// Resolution label for a pixel height
pub fn bucket_height(height: u64) -> String {
    match height {
        h if h >= 1080 => "1080p".to_string(),
        h if h >= 720 => "720p".to_string(),
        h if h >= 480 => "480p".to_string(),
        h if h >= 360 => "360p".to_string(),
        h if h >= 240 => "240p".to_string(),
        h => format!("{}p", h),
    }
}

fn label_value(label: &str) -> u64 {
    label.trim_end_matches('p').parse().unwrap_or(0)
}

/// Distinct labels for `heights`, highest first
pub fn quality_labels<I>(heights: I) -> Vec<String>
where
    I: IntoIterator<Item = u64>,
{
    let mut labels: Vec<String> = heights.into_iter().map(bucket_height).collect();
    labels.sort_by_key(|l| std::cmp::Reverse(label_value(l)));
    labels.dedup();
    labels
}

pub fn default_probe() -> ProbeInfo {
    ProbeInfo {
        title: None,
        thumbnail: None,
        qualities: DEFAULT_LADDER.iter().map(|s| s.to_string()).collect(),
        fell_back: true,
    }
}

/// Parse the single JSON object printed by `--dump-json`.
///
/// A video without usable heights still parses; it just gets the default ladder.
pub fn parse_probe_json(stdout: &str) -> Result<ProbeInfo, DownloadError> {
    // Playlists print one object per line; the first entry describes the video.
    let body = stdout
        .lines()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| DownloadError::ParseError("no JSON object in probe output".to_string()))?;

    let info: RawInfo = serde_json::from_str(body)
        .map_err(|e| DownloadError::ParseError(format!("probe JSON: {}", e)))?;

    let thumbnail = info.thumbnail.filter(|t| !t.is_empty()).or_else(|| {
        info.thumbnails
            .iter()
            .filter(|t| t.url.is_some())
            .max_by_key(|t| t.width.unwrap_or(0) * t.height.unwrap_or(0))
            .and_then(|t| t.url.clone())
    });

    let heights = info
        .formats
        .iter()
        .filter(|f| matches!(f.vcodec.as_deref(), Some(v) if v != "none" && !v.is_empty()))
        .filter_map(|f| f.height);
    let labels = quality_labels(heights);

    if labels.is_empty() {
        return Ok(ProbeInfo {
            title: info.title,
            thumbnail,
            ..default_probe()
        });
    }

    let mut qualities = vec![Quality::AUTO_LABEL.to_string()];
    qualities.extend(labels);

    Ok(ProbeInfo {
        title: info.title,
        thumbnail,
        qualities,
        fell_back: false,
    })
}

/// Leading id of the first `-F` row mentioning `quality`. `None` means "let yt-dlp pick".
pub fn resolve_format_id(listing: &str, quality: &Quality, platform: Platform) -> Option<String> {
    let label = quality.label()?;

    for line in listing.lines() {
        if !line.contains(label) {
            continue;
        }
        if FORMAT_ROW_RE.is_match(line) {
            return line.split_whitespace().next().map(str::to_string);
        }
        // TikTok ids are not numeric ("h264_540p_..."), match on codec instead
        if platform == Platform::TikTok && TIKTOK_CODEC_TOKENS.iter().any(|t| line.contains(t)) {
            return line.split_whitespace().next().map(str::to_string);
        }
    }
    None
}
