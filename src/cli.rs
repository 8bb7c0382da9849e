//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use eyre::{Context, OptionExt, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::App;
use crate::config::Settings;
use crate::downloader::encode::{self, EncodeJob, Watermark};
use crate::downloader::models::{Crop, OutputFormat, Quality, Scale, Timestamp};
use crate::downloader::orchestrator::{DownloadRequest, Request};
use crate::downloader::{platform, thumbnail, url, ProcessRunner, ToolManager};
use crate::logging::LogMode;
use crate::player::ExternalPlayer;

#[derive(Debug, Parser)]
#[command(name = "clipfetch")]
#[command(about = "Download, convert and trim videos with yt-dlp and ffmpeg")]
#[command(version)]
pub struct Cli {
    /// Settings file (default: <config dir>/clipfetch/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug entries in the log
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the canonical URL and platform for pasted text
    Normalize {
        text: String,
    },

    /// List the qualities offered for a video
    Probe {
        url: String,

        /// Save the video thumbnail here
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },

    /// Download a video or its audio track
    Download {
        url: String,

        #[arg(short, long, default_value = "mp4")]
        format: OutputFormat,

        /// Resolution label from `probe`, e.g. 720p (default: auto)
        #[arg(short, long)]
        quality: Option<Quality>,

        /// Output directory (default: settings, then the system download directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        embed_metadata: bool,

        #[arg(long)]
        embed_thumbnail: bool,
    },

    /// Re-encode to H.264/AAC MP4
    Convert {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the result in the player afterwards
        #[arg(long)]
        load: bool,
    },

    /// Trim, crop, scale, speed up, watermark or re-score a video
    Edit {
        input: PathBuf,

        /// H:MM:SS[.mmm] or seconds
        #[arg(long)]
        start: Option<Timestamp>,

        #[arg(long)]
        end: Option<Timestamp>,

        /// W:H:X:Y
        #[arg(long)]
        crop: Option<Crop>,

        /// W:H, -1 or -2 keeps the aspect ratio
        #[arg(long)]
        scale: Option<Scale>,

        /// Playback speed factor, 0.25 to 4
        #[arg(long)]
        speed: Option<f64>,

        /// Image overlaid on the video
        #[arg(long)]
        watermark: Option<PathBuf>,

        /// X:Y offset of the watermark
        #[arg(long, value_parser = parse_position, requires = "watermark")]
        watermark_pos: Option<(i32, i32)>,

        /// Background music mixed under the original audio
        #[arg(long)]
        music: Option<PathBuf>,

        /// Write an MP3 instead of a video
        #[arg(long)]
        audio_only: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Concatenate videos without re-encoding
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        #[arg(long)]
        start: Option<Timestamp>,

        #[arg(long)]
        end: Option<Timestamp>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Keep only the audio track, as MP3
    ExtractAudio {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Save a single frame as an image
    Screenshot {
        input: PathBuf,

        #[arg(long)]
        at: Timestamp,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Wait for download commands from a remote control server
    Remote {
        /// host:port (default: settings)
        #[arg(long)]
        server: Option<String>,
    },

    /// Show where yt-dlp and ffmpeg were found
    Tools,
}

fn parse_position(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(':')
        .ok_or_else(|| format!("expected X:Y, got {:?}", s))?;
    let x = x.trim().parse().map_err(|_| format!("invalid X in {:?}", s))?;
    let y = y.trim().parse().map_err(|_| format!("invalid Y in {:?}", s))?;
    Ok((x, y))
}

/// Load settings and apply global flags
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).wrap_err("failed to load settings")?;
    if cli.verbose {
        settings.log_mode = LogMode::Verbose;
    }
    Ok(settings)
}

fn build_app(settings: Settings) -> App {
    let tools = ToolManager::new(settings.tools_dir.clone());
    let player = ExternalPlayer::new(&settings.player);
    App::new(settings, Arc::new(ProcessRunner::new(tools)), Box::new(player))
}

/// Execute CLI command - separated for testing.
pub async fn run_cli(cli: Cli, settings: Settings) -> Result<()> {
    tracing::debug!(?cli, "parsed arguments");

    match cli.command {
        Commands::Normalize { text } => {
            let canonical = url::normalize(&text);
            println!("{}\t{}", canonical, platform::classify(&canonical));
            Ok(())
        }

        Commands::Tools => {
            let tools = ToolManager::new(settings.tools_dir.clone());
            for info in tools.get_all_tools() {
                let status = if info.is_available { "ok" } else { "missing" };
                println!(
                    "{:<8} {:<8} {} {}",
                    info.name,
                    status,
                    info.path.as_deref().unwrap_or("-"),
                    info.version.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }

        Commands::Probe {
            url,
            thumbnail: thumbnail_dest,
        } => {
            let mut app = build_app(settings);
            let finished = app.perform(Request::Probe { text: url }).await?;
            let info = finished.probe.ok_or_eyre("probe produced no result")?;

            if let Some(title) = &info.title {
                println!("{}", title);
            }
            println!("{}", info.qualities.join(" "));

            if let Some(dest) = thumbnail_dest {
                let source = info
                    .thumbnail
                    .as_deref()
                    .ok_or_eyre("no thumbnail reported for this video")?;
                thumbnail::fetch_thumbnail(source, &dest)
                    .await
                    .wrap_err("failed to save thumbnail")?;
            }
            Ok(())
        }

        Commands::Download {
            url,
            format,
            quality,
            output_dir,
            embed_metadata,
            embed_thumbnail,
        } => {
            let mut req =
                DownloadRequest::new(url, output_dir.unwrap_or_else(|| settings.download_dir.clone()));
            req.format = format;
            req.quality = quality.unwrap_or(Quality::Auto);
            req.embed_metadata = embed_metadata || settings.embed_metadata;
            req.embed_thumbnail = embed_thumbnail || settings.embed_thumbnail;

            let mut app = build_app(settings);
            report(app.perform(Request::Download(req)).await?.output);
            Ok(())
        }

        Commands::Convert {
            input,
            output,
            load,
        } => {
            let output = output.unwrap_or_else(|| {
                if load {
                    encode::temp_converted_path(&input)
                } else {
                    encode::sibling_output(&input, "_converted", "mp4")
                }
            });

            let mut app = build_app(settings);
            report(
                app.perform(Request::Convert {
                    input,
                    output,
                    load,
                })
                .await?
                .output,
            );
            Ok(())
        }

        Commands::Edit {
            input,
            start,
            end,
            crop,
            scale,
            speed,
            watermark,
            watermark_pos,
            music,
            audio_only,
            output,
        } => {
            let format = if audio_only {
                OutputFormat::Mp3
            } else {
                OutputFormat::Mp4
            };
            let output =
                output.unwrap_or_else(|| encode::sibling_output(&input, "_edited", format.as_str()));

            let mut job = EncodeJob::new(input, output);
            job.format = format;
            job.start = start;
            job.end = end;
            job.crop = crop;
            job.scale = scale;
            job.speed = speed;
            job.watermark = watermark.map(|path| match watermark_pos {
                Some((x, y)) => Watermark::new(path).at(x, y),
                None => Watermark::new(path),
            });
            job.music = music;

            let mut app = build_app(settings);
            report(app.perform(Request::Edit(job)).await?.output);
            Ok(())
        }

        Commands::Merge {
            inputs,
            start,
            end,
            output,
        } => {
            let output = match output {
                Some(path) => path,
                None => merged_output(&inputs)?,
            };

            let mut app = build_app(settings);
            report(
                app.perform(Request::Merge {
                    inputs,
                    start,
                    end,
                    output,
                })
                .await?
                .output,
            );
            Ok(())
        }

        Commands::ExtractAudio { input, output } => {
            let output = output.unwrap_or_else(|| extracted_audio_output(&input));

            let mut app = build_app(settings);
            report(
                app.perform(Request::ExtractAudio { input, output })
                    .await?
                    .output,
            );
            Ok(())
        }

        Commands::Screenshot { input, at, output } => {
            let output = output.unwrap_or_else(|| settings.download_dir.join("screenshot.png"));

            let mut app = build_app(settings);
            report(
                app.perform(Request::Screenshot { input, at, output })
                    .await?
                    .output,
            );
            Ok(())
        }

        Commands::Remote { server } => {
            let addr = server
                .or_else(|| settings.control_server.clone())
                .ok_or_eyre("no control server configured, pass --server HOST:PORT")?;

            let mut app = build_app(settings);
            app.serve_remote(addr).await
        }
    }
}

fn merged_output(inputs: &[PathBuf]) -> Result<PathBuf> {
    let first = inputs.first().ok_or_eyre("nothing to merge")?;
    Ok(encode::sibling_output(first, "_merged", "mp4"))
}

fn extracted_audio_output(input: &Path) -> PathBuf {
    encode::sibling_output(input, "_audio", "mp3")
}

/// Print the produced path on stdout; progress and logs go to stderr.
fn report(output: Option<PathBuf>) {
    if let Some(path) = output {
        println!("{}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_download_command() {
        let cli = Cli::parse_from([
            "clipfetch",
            "download",
            "https://youtu.be/abc",
            "-f",
            "mp3",
            "-q",
            "720p",
        ]);

        assert!(matches!(
            &cli.command,
            Commands::Download { url, format: OutputFormat::Mp3, quality: Some(Quality::Label(q)), output_dir: None, .. }
            if url == "https://youtu.be/abc" && q == "720p"
        ));
    }

    #[test]
    fn parses_edit_values() {
        let cli = Cli::parse_from([
            "clipfetch",
            "edit",
            "in.mp4",
            "--start",
            "00:00:05",
            "--crop",
            "640:360:0:0",
            "--watermark",
            "logo.png",
            "--watermark-pos",
            "20:30",
        ]);

        match cli.command {
            Commands::Edit {
                start,
                crop,
                watermark_pos,
                ..
            } => {
                assert_eq!(start.map(|t| t.as_secs_f64()), Some(5.0));
                assert_eq!(crop.map(|c| (c.width, c.height)), Some((640, 360)));
                assert_eq!(watermark_pos, Some((20, 30)));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_edit_values() {
        assert!(Cli::try_parse_from(["clipfetch", "edit", "in.mp4", "--crop", "0:360:0:0"]).is_err());
        assert!(Cli::try_parse_from(["clipfetch", "edit", "in.mp4", "--watermark-pos", "1:2"]).is_err());
    }

    #[test]
    fn merge_needs_two_inputs() {
        assert!(Cli::try_parse_from(["clipfetch", "merge", "a.mp4"]).is_err());
        let cli = Cli::parse_from(["clipfetch", "merge", "a.mp4", "b.mp4", "c.mp4"]);
        assert!(matches!(&cli.command, Commands::Merge { inputs, .. } if inputs.len() == 3));
    }

    #[test]
    fn default_merge_output_sits_next_to_first_input() {
        let out = merged_output(&[PathBuf::from("/v/a.mp4"), PathBuf::from("/v/b.mp4")]).unwrap();
        assert_eq!(out, PathBuf::from("/v/a_merged.mp4"));
    }

    #[test]
    fn default_audio_output_never_overwrites_input() {
        assert_eq!(
            extracted_audio_output(Path::new("/v/song.mp3")),
            PathBuf::from("/v/song_audio.mp3")
        );
        assert_eq!(
            extracted_audio_output(Path::new("/v/clip.mp4")),
            PathBuf::from("/v/clip_audio.mp3")
        );
    }

    #[test]
    fn global_flags_anywhere() {
        let cli = Cli::parse_from(["clipfetch", "tools", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Tools));
    }
}
