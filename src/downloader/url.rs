//! Canonical URL extraction from arbitrary pasted text.
//!
//! Users paste share text ("check this out https://... lol"), clipboard junk or a bare
//! link. [`normalize`] digs out the first usable link and rewrites it into the form the
//! rest of the pipeline dispatches on. It never fails: when nothing can be extracted the
//! input comes back verbatim.

use regex::Regex;

const MUSIC_HOST: &str = "music.youtube.com";
const VIDEO_HOST: &str = "www.youtube.com";

lazy_static::lazy_static! {
    static ref MUSIC_WATCH_RE: Regex =
        Regex::new(r"(https?://music\.youtube\.com/watch\?[\w\-.?,'/\\+&%$#=:()~]+)").unwrap();
    static ref BV_ID_RE: Regex = Regex::new(r"BV\w+").unwrap();
    static ref TIKTOK_RE: Regex =
        Regex::new(r"(https?://(?:www\.)?tiktok\.com/\S+)").unwrap();
    static ref TIKTOK_VIDEO_RE: Regex = Regex::new(r"@([^/]+)/video/(\d+)").unwrap();
    static ref GENERIC_RE: Regex =
        Regex::new(r"(https?://[\w\-.?,'/\\+&%$#=:()~]+)").unwrap();
    static ref FRAGMENT_RE: Regex = Regex::new(r"#.*$").unwrap();
    static ref DUP_SLASH_RE: Regex = Regex::new(r"([^:])//+").unwrap();
}

/// Extract a canonical platform URL from `text`.
///
/// Branches are tried in order and the first hit wins:
/// 1. YouTube Music watch link carrying `v=` → same link on `www.youtube.com`, cleaned
///    like branch 4
/// 2. Bilibili text with a `BV…` id → `https://www.bilibili.com/video/<id>`
/// 3. TikTok link → minimal `@user/video/<id>` form when possible, else cleaned
/// 4. Any other `http(s)://` link → fragment dropped, duplicate slashes collapsed,
///    trailing slash removed, music host rewritten
/// 5. Nothing found → `text` unchanged
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lower = text.to_lowercase();

    if lower.contains(MUSIC_HOST) {
        if let Some(m) = MUSIC_WATCH_RE.captures(text).and_then(|c| c.get(1)) {
            if m.as_str().contains("v=") {
                return clean_generic(m.as_str());
            }
        }
    }

    if lower.contains("bilibili.com") {
        if let Some(m) = BV_ID_RE.find(text) {
            return format!("https://www.bilibili.com/video/{}", m.as_str());
        }
    }

    if lower.contains("tiktok.com") {
        if let Some(m) = TIKTOK_RE.captures(text).and_then(|c| c.get(1)) {
            let url = m.as_str();
            if url.contains("/video/") {
                if let Some(caps) = TIKTOK_VIDEO_RE.captures(url) {
                    return format!("https://www.tiktok.com/@{}/video/{}", &caps[1], &caps[2]);
                }
            }
            return clean_generic(url);
        }
    }

    if let Some(m) = GENERIC_RE.captures(text).and_then(|c| c.get(1)) {
        return clean_generic(m.as_str());
    }

    text.to_string()
}

fn clean_generic(url: &str) -> String {
    let url = FRAGMENT_RE.replace(url, "");
    let url = DUP_SLASH_RE.replace_all(&url, "$1/");
    let mut url = url.trim_end_matches('/').to_string();

    if url.to_lowercase().contains(MUSIC_HOST) && url.contains("v=") {
        url = url.replacen(MUSIC_HOST, VIDEO_HOST, 1);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_music_links() {
        assert_eq!(
            normalize("check this out https://music.youtube.com/watch?v=abc123&list=xyz"),
            "https://www.youtube.com/watch?v=abc123&list=xyz"
        );
    }

    #[test]
    fn music_links_lose_fragment_and_trailing_junk() {
        assert_eq!(
            normalize("https://music.youtube.com/watch?v=abc123#t=10"),
            "https://www.youtube.com/watch?v=abc123"
        );
        assert_eq!(
            normalize("<https://music.youtube.com/watch?v=abc123>"),
            "https://www.youtube.com/watch?v=abc123"
        );
    }

    #[test]
    fn music_link_without_video_id_is_cleaned_only() {
        assert_eq!(
            normalize("https://music.youtube.com/playlist?list=PL1/"),
            "https://music.youtube.com/playlist?list=PL1"
        );
    }

    #[test]
    fn extracts_bilibili_id() {
        assert_eq!(
            normalize("https://www.bilibili.com/video/BV1xx411c7mD?p=2 great video"),
            "https://www.bilibili.com/video/BV1xx411c7mD"
        );
    }

    #[test]
    fn shortens_tiktok_video_links() {
        assert_eq!(
            normalize("lol https://www.tiktok.com/@some.user/video/7301234567890?is_from_webapp=1&sender_device=pc"),
            "https://www.tiktok.com/@some.user/video/7301234567890"
        );
    }

    #[test]
    fn keeps_tiktok_live_links() {
        assert_eq!(
            normalize("https://www.tiktok.com/@streamer/live"),
            "https://www.tiktok.com/@streamer/live"
        );
        assert_eq!(
            normalize("https://www.tiktok.com/@streamer/live/#top"),
            "https://www.tiktok.com/@streamer/live"
        );
    }

    #[test]
    fn short_tiktok_links_fall_through_to_generic_cleanup() {
        let url = normalize("see https://vm.tiktok.com/ZMabc/ lol");
        assert!(url.contains("tiktok.com"));
        assert!(!url.ends_with('/'));
        assert!(!url.contains('#'));
        assert!(!url["https://".len()..].contains("//"));
        assert_eq!(url, "https://vm.tiktok.com/ZMabc");
    }

    #[test]
    fn generic_cleanup() {
        assert_eq!(
            normalize("https://vimeo.com//12345/#t=30"),
            "https://vimeo.com/12345"
        );
        assert_eq!(
            normalize("https://www.instagram.com/reel/Cabc123/?igsh=xyz"),
            "https://www.instagram.com/reel/Cabc123/?igsh=xyz"
        );
    }

    #[test]
    fn keeps_query_parameters() {
        assert_eq!(
            normalize("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"
        );
    }

    #[test]
    fn first_url_wins() {
        assert_eq!(
            normalize("a https://vimeo.com/1 b https://vimeo.com/2"),
            "https://vimeo.com/1"
        );
    }

    #[test]
    fn text_without_url_is_returned_verbatim() {
        assert_eq!(normalize("no link here"), "no link here");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("bilibili.com but no id"), "bilibili.com but no id");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "check this out https://music.youtube.com/watch?v=abc123&list=xyz",
            "https://www.bilibili.com/video/BV1xx411c7mD?p=2 great video",
            "see https://vm.tiktok.com/ZMabc/ lol",
            "lol https://www.tiktok.com/@u/video/123?x=1",
            "https://www.tiktok.com/@u/live",
            "https://www.tiktok.com/@u/live/#top",
            "https://vimeo.com//12345/#t=30",
            "https://x.com/user/status/1///",
            "https://www.instagram.com/someuser/",
            "nothing to see",
            "",
            "https:///",
            "https://music.youtube.com/watch?list=abc",
            "https://music.youtube.com/watch?v=abc123#t=10",
            "<https://music.youtube.com/watch?v=abc123>",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }
}
