//! Integration tests for the pasted-text → command pipeline.

use clipfetch::downloader::commands::{self, BEST_VIDEO_SELECTOR};
use clipfetch::downloader::encode::{self, EncodeJob, Watermark};
use clipfetch::downloader::format_selector;
use clipfetch::downloader::platform::{self, Platform};
use clipfetch::downloader::url::normalize;
use clipfetch::downloader::{DownloadError, DownloadSpec, OutputFormat, Quality, Timestamp};

#[test]
fn normalize_is_idempotent() {
    let inputs = [
        "check this out https://music.youtube.com/watch?v=abc123&list=xyz",
        "https://www.bilibili.com/video/BV1xx411c7mD?p=2 great video",
        "see https://vm.tiktok.com/ZMabc/ lol",
        "https://www.tiktok.com/@someone/video/7312345678901234567?is_from_webapp=1",
        "https://example.com//a//b/#frag",
        "https://music.youtube.com/watch?v=abc123#t=10",
        "<https://music.youtube.com/watch?v=abc123>",
        "no link here",
        "",
    ];
    for input in inputs {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "input: {:?}", input);
    }
}

#[test]
fn share_text_to_canonical_urls() {
    assert_eq!(
        normalize("check this out https://music.youtube.com/watch?v=abc123&list=xyz"),
        "https://www.youtube.com/watch?v=abc123&list=xyz"
    );
    assert_eq!(
        normalize("https://www.bilibili.com/video/BV1xx411c7mD?p=2 great video"),
        "https://www.bilibili.com/video/BV1xx411c7mD"
    );

    let tiktok = normalize("see https://vm.tiktok.com/ZMabc/ lol");
    assert!(tiktok.contains("tiktok.com"));
    assert!(!tiktok.ends_with('/'));
    assert!(!tiktok.contains('#'));
    assert!(!tiktok["https://".len()..].contains("//"));
}

#[test]
fn instagram_content_versus_profile() {
    let reel = "https://www.instagram.com/reel/Cabc123/";
    assert_eq!(platform::classify(reel), Platform::Instagram);
    assert!(!platform::is_photo_profile_url(reel));

    let profile = "https://www.instagram.com/someuser/";
    assert_eq!(platform::classify(profile), Platform::Instagram);
    assert!(platform::is_photo_profile_url(profile));
    assert!(matches!(
        platform::validate(profile, &normalize(profile)),
        Err(DownloadError::InvalidUrl(_))
    ));
}

#[test]
fn pasted_youtube_link_to_download_command() {
    let text = "watch https://music.youtube.com/watch?v=abc123 now";
    let url = normalize(text);
    let platform = platform::validate(text, &url).unwrap();
    assert_eq!(platform, Platform::YouTube);

    let listing = "136  mp4  1280x720  720p  30 | 20.1MiB | avc1.4d401f";
    let quality = Quality::Label("720p".to_string());
    let id = format_selector::resolve_format_id(listing, &quality, platform);

    let spec = DownloadSpec::new(url.clone(), "/tmp/downloads")
        .with_quality(quality)
        .with_format_id(id);
    let cmd = commands::build_download_command(&spec);

    assert_eq!(cmd.value_of("-f"), Some("136"));
    assert_eq!(cmd.value_of("--merge-output-format"), Some("mp4"));
    assert_eq!(cmd.args.last().map(String::as_str), Some(url.as_str()));
}

#[test]
fn absent_quality_uses_best_selector() {
    let listing = "136  mp4  1280x720  720p  30 | 20.1MiB | avc1.4d401f";
    let quality = Quality::Label("1080p".to_string());
    let id = format_selector::resolve_format_id(listing, &quality, Platform::YouTube);
    assert!(id.is_none());

    let spec = DownloadSpec::new("https://www.youtube.com/watch?v=abc", "/tmp")
        .with_quality(quality)
        .with_format_id(id);
    let cmd = commands::build_download_command(&spec);
    assert_eq!(cmd.value_of("-f"), Some(BEST_VIDEO_SELECTOR));
}

#[test]
fn audio_download_skips_format_selection() {
    let spec = DownloadSpec::new("https://www.youtube.com/watch?v=abc", "/tmp")
        .with_format(OutputFormat::Mp3);
    let cmd = commands::build_download_command(&spec);
    assert!(cmd.has_flag("-x"));
    assert_eq!(cmd.value_of("--audio-format"), Some("mp3"));
    assert!(!cmd.has_flag("-f"));
}

#[test]
fn multi_input_edits_always_map_explicitly() {
    let mut job = EncodeJob::new("/v/in put.mp4", "/v/out.mp4");
    job.start = Some("00:00:05".parse::<Timestamp>().unwrap());
    job.end = Some("00:00:20".parse::<Timestamp>().unwrap());
    job.speed = Some(1.5);
    job.watermark = Some(Watermark::new("/v/logo.png"));
    job.music = Some("/v/track.mp3".into());

    let cmd = encode::build_encode_command(&job).unwrap();
    let inputs = cmd.args.iter().filter(|a| *a == "-i").count();
    let maps = cmd.args.iter().filter(|a| *a == "-map").count();
    assert_eq!(inputs, 3);
    assert_eq!(maps, 2);
    assert!(cmd.has_flag("-filter_complex"));
    // paths with spaces stay a single argument
    assert!(cmd.has_flag("/v/in put.mp4"));
}

#[test]
fn edit_validation_rejects_before_building() {
    let mut job = EncodeJob::new("/v/in.mp4", "/v/out.mp4");
    job.start = Some(Timestamp::from_secs_f64(10.0));
    job.end = Some(Timestamp::from_secs_f64(5.0));
    assert!(matches!(
        encode::build_encode_command(&job),
        Err(DownloadError::InvalidEditParams(_))
    ));
}
