//! Integration tests for the clipfetch CLI.

use clap::Parser;
use clipfetch::cli::{run_cli, Cli, Commands};
use clipfetch::config::Settings;

#[test]
fn parses_every_subcommand() {
    let cases: &[&[&str]] = &[
        &["clipfetch", "normalize", "see https://youtu.be/abc"],
        &["clipfetch", "probe", "https://youtu.be/abc", "--thumbnail", "t.jpg"],
        &["clipfetch", "download", "https://youtu.be/abc", "-o", "/tmp/out"],
        &["clipfetch", "convert", "in.avi", "--load"],
        &["clipfetch", "edit", "in.mp4", "--speed", "2", "--audio-only"],
        &["clipfetch", "merge", "a.mp4", "b.mp4", "--end", "00:01:00"],
        &["clipfetch", "extract-audio", "in.mp4"],
        &["clipfetch", "screenshot", "in.mp4", "--at", "12.5"],
        &["clipfetch", "remote", "--server", "127.0.0.1:9000"],
        &["clipfetch", "tools"],
    ];
    for args in cases {
        assert!(Cli::try_parse_from(args.iter().copied()).is_ok(), "failed to parse {:?}", args);
    }
}

#[test]
fn screenshot_requires_timestamp() {
    assert!(Cli::try_parse_from(["clipfetch", "screenshot", "in.mp4"]).is_err());
    assert!(Cli::try_parse_from(["clipfetch", "screenshot", "in.mp4", "--at", "soon"]).is_err());
}

#[test]
fn download_format_is_checked() {
    assert!(Cli::try_parse_from(["clipfetch", "download", "https://youtu.be/abc", "-f", "avi"]).is_err());
}

#[tokio::test]
async fn normalize_runs_without_tools() {
    let cli = Cli::parse_from(["clipfetch", "normalize", "https://youtu.be/abc"]);
    assert!(matches!(cli.command, Commands::Normalize { .. }));
    run_cli(cli, Settings::default()).await.unwrap();
}

#[tokio::test]
async fn remote_without_server_is_an_error() {
    let cli = Cli::parse_from(["clipfetch", "remote"]);
    let settings = Settings {
        control_server: None,
        ..Settings::default()
    };
    assert!(run_cli(cli, settings).await.is_err());
}

#[tokio::test]
#[ignore = "network I/O and yt-dlp/ffmpeg required"]
async fn download_fetches_a_video() {
    let temp_dir = std::env::temp_dir().join("clipfetch-cli-test");
    if temp_dir.exists() {
        std::fs::remove_dir_all(&temp_dir).ok();
    }
    std::fs::create_dir_all(&temp_dir).expect("failed to create temp dir");

    let cli = Cli::parse_from([
        "clipfetch",
        "download",
        "https://youtu.be/jNQXAC9IVRw",
        "-o",
        temp_dir.to_str().unwrap(),
    ]);
    run_cli(cli, Settings::default())
        .await
        .expect("failed to download");

    let produced = std::fs::read_dir(&temp_dir).unwrap().count();
    assert!(produced > 0, "nothing downloaded into {}", temp_dir.display());
}
