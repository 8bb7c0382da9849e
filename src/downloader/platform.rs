// Platform classification and pre-flight URL checks

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DownloadError;
use super::models::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    YouTube,
    Bilibili,
    TikTok,
    Instagram,
    Twitter,
    Facebook,
    Vimeo,
    Twitch,
    Unknown,
}

/// What the pipeline can do for a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `--live-from-start` is meaningful
    pub live_stream: bool,
    /// mp3 extraction is offered
    pub audio_only: bool,
    /// `--dump-json` exposes usable format heights
    pub quality_probe: bool,
}

/// Host fragments in match order. First hit wins.
const HOST_TABLE: &[(&str, Platform)] = &[
    ("music.youtube.com", Platform::YouTube),
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
    ("bilibili.com", Platform::Bilibili),
    ("b23.tv", Platform::Bilibili),
    ("tiktok.com", Platform::TikTok),
    ("instagram.com", Platform::Instagram),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("facebook.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
    ("vimeo.com", Platform::Vimeo),
    ("twitch.tv", Platform::Twitch),
];

/// Path segments that mark an Instagram URL as a single piece of content
const INSTAGRAM_CONTENT_MARKERS: &[&str] = &["/p/", "/reel/", "/tv/", "/stories/"];

lazy_static::lazy_static! {
    static ref HOST_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://([^/?#\s]+)").unwrap();
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Bilibili => "Bilibili",
            Self::TikTok => "TikTok",
            Self::Instagram => "Instagram",
            Self::Twitter => "Twitter",
            Self::Facebook => "Facebook",
            Self::Vimeo => "Vimeo",
            Self::Twitch => "Twitch",
            Self::Unknown => "Unknown",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let audio_only = matches!(self, Self::YouTube | Self::Bilibili | Self::Unknown);
        Capabilities {
            live_stream: matches!(self, Self::TikTok),
            audio_only,
            quality_probe: true,
        }
    }

    /// Formats offered for this platform, video first
    pub fn output_formats(&self) -> Vec<OutputFormat> {
        if self.capabilities().audio_only {
            vec![OutputFormat::Mp4, OutputFormat::Mp3]
        } else {
            vec![OutputFormat::Mp4]
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host part of `url`, lowercased. Falls back to the whole string for scheme-less input.
fn host_of(url: &str) -> String {
    HOST_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(url)
        .to_lowercase()
}

/// Path and query with the fragment removed
fn path_of(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let rest = rest.split('#').next().unwrap_or(rest);
    match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => "",
    }
}

/// Which platform a canonical URL belongs to
pub fn classify(url: &str) -> Platform {
    let host = host_of(url);
    HOST_TABLE
        .iter()
        .find(|(fragment, _)| host_matches(&host, fragment))
        .map(|(_, platform)| *platform)
        .unwrap_or(Platform::Unknown)
}

fn host_matches(host: &str, fragment: &str) -> bool {
    // "x.com" must not match "box.com"
    host == fragment || host.ends_with(&format!(".{}", fragment))
}

/// TikTok live broadcast (`/@user/live`)
pub fn is_short_form_live_url(url: &str) -> bool {
    classify(url) == Platform::TikTok && path_of(url).to_lowercase().contains("/live")
}

/// Instagram URL pointing at a profile root rather than a post, reel, IGTV or story
pub fn is_photo_profile_url(url: &str) -> bool {
    if classify(url) != Platform::Instagram {
        return false;
    }
    let path = path_of(url);
    let path = path.split('?').next().unwrap_or(path);
    let path = if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    };
    !INSTAGRAM_CONTENT_MARKERS.iter().any(|m| path.contains(m))
}

/// Reject links the downloader cannot handle before any process is spawned.
///
/// `raw` is what the user pasted, `url` its normalized form.
pub fn validate(raw: &str, url: &str) -> Result<Platform, DownloadError> {
    if url.trim().is_empty() {
        return Err(DownloadError::InvalidUrl("please enter a video URL".to_string()));
    }

    if raw.to_lowercase().contains("douyin.com") || url.to_lowercase().contains("douyin.com") {
        return Err(DownloadError::InvalidUrl(
            "Douyin links are not supported, use TikTok or another platform".to_string(),
        ));
    }

    let platform = classify(url);
    let lower = url.to_lowercase();

    match platform {
        Platform::YouTube if lower.contains("youtube.com/watch") && !url.contains("v=") => {
            Err(DownloadError::InvalidUrl(
                "YouTube / YouTube Music watch links need a v= parameter".to_string(),
            ))
        }
        Platform::TikTok if !lower.contains("/video/") && !lower.contains("/live") => {
            Err(DownloadError::InvalidUrl(
                "TikTok links must look like https://www.tiktok.com/@user/video/1234567890 \
                 or https://www.tiktok.com/@user/live"
                    .to_string(),
            ))
        }
        Platform::Instagram if is_photo_profile_url(url) => Err(DownloadError::InvalidUrl(
            "Instagram profiles cannot be downloaded directly; use a post (/p/), \
             reel (/reel/) or story (/stories/) link"
                .to_string(),
        )),
        _ => Ok(platform),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_hosts() {
        assert_eq!(classify("https://www.youtube.com/watch?v=x"), Platform::YouTube);
        assert_eq!(classify("https://youtu.be/x"), Platform::YouTube);
        assert_eq!(classify("https://www.bilibili.com/video/BV1"), Platform::Bilibili);
        assert_eq!(classify("https://vm.tiktok.com/ZMabc"), Platform::TikTok);
        assert_eq!(classify("https://x.com/a/status/1"), Platform::Twitter);
        assert_eq!(classify("https://fb.watch/abc"), Platform::Facebook);
        assert_eq!(classify("https://vimeo.com/1"), Platform::Vimeo);
        assert_eq!(classify("https://www.twitch.tv/chan"), Platform::Twitch);
        assert_eq!(classify("https://box.com/file"), Platform::Unknown);
        assert_eq!(classify("not a url"), Platform::Unknown);
    }

    #[test]
    fn instagram_profile_detection() {
        let reel = "https://www.instagram.com/reel/Cabc123/";
        assert_eq!(classify(reel), Platform::Instagram);
        assert!(!is_photo_profile_url(reel));

        let profile = "https://www.instagram.com/someuser/";
        assert_eq!(classify(profile), Platform::Instagram);
        assert!(is_photo_profile_url(profile));

        // normalized forms lose the trailing slash
        assert!(!is_photo_profile_url("https://www.instagram.com/p/Cxyz"));
        assert!(is_photo_profile_url("https://www.instagram.com/someuser?igsh=1"));
        assert!(!is_photo_profile_url("https://www.youtube.com/someuser"));
    }

    #[test]
    fn tiktok_live_detection() {
        assert!(is_short_form_live_url("https://www.tiktok.com/@streamer/live"));
        assert!(!is_short_form_live_url("https://www.tiktok.com/@u/video/1"));
        assert!(!is_short_form_live_url("https://www.twitch.tv/live"));
    }

    #[test]
    fn capabilities_follow_platform() {
        assert_eq!(
            Platform::YouTube.output_formats(),
            vec![OutputFormat::Mp4, OutputFormat::Mp3]
        );
        assert_eq!(Platform::TikTok.output_formats(), vec![OutputFormat::Mp4]);
        assert!(Platform::TikTok.capabilities().live_stream);
        assert!(!Platform::Vimeo.capabilities().audio_only);
    }

    #[test]
    fn validation_rejects_before_spawn() {
        assert!(validate("", "").is_err());
        assert!(validate("https://v.douyin.com/abc", "https://v.douyin.com/abc").is_err());
        assert!(validate(
            "https://www.youtube.com/watch?list=1",
            "https://www.youtube.com/watch?list=1"
        )
        .is_err());
        assert!(validate("https://www.tiktok.com/@u", "https://www.tiktok.com/@u").is_err());
        assert!(validate(
            "https://www.instagram.com/someuser/",
            "https://www.instagram.com/someuser"
        )
        .is_err());

        assert_eq!(
            validate("x", "https://www.youtube.com/watch?v=abc").unwrap(),
            Platform::YouTube
        );
        assert_eq!(
            validate("x", "https://www.tiktok.com/@u/live").unwrap(),
            Platform::TikTok
        );
        assert_eq!(validate("x", "https://example.com/v.mp4").unwrap(), Platform::Unknown);
    }
}
