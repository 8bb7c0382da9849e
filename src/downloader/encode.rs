//! ffmpeg argument vectors for edit-mode jobs.
//!
//! [`build_encode_command`] composes every requested transformation into one
//! `-filter_complex` graph with labelled outputs (`[vout]`, `[aout]`) and always
//! selects the final streams with explicit `-map` arguments. The fixed jobs
//! (conversion, audio extraction, screenshot, concat merge) live alongside it.

use std::path::{Path, PathBuf};

use super::commands::CommandVector;
use super::errors::DownloadError;
use super::models::{Crop, OutputFormat, Scale, Timestamp};
use super::tools::ToolKind;

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

/// atempo accepts 0.5..=2.0 per instance
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

const AMIX: &str = "amix=inputs=2:duration=first:dropout_transition=2";

#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub path: PathBuf,
    pub x: i32,
    pub y: i32,
}

impl Watermark {
    /// Top-left corner with a 10px margin
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            x: 10,
            y: 10,
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

/// One edit-mode encode: every field except `input`/`output` is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub crop: Option<Crop>,
    pub scale: Option<Scale>,
    pub speed: Option<f64>,
    pub watermark: Option<Watermark>,
    pub music: Option<PathBuf>,
}

impl EncodeJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            format: OutputFormat::Mp4,
            start: None,
            end: None,
            crop: None,
            scale: None,
            speed: None,
            watermark: None,
            music: None,
        }
    }

    pub fn validate(&self) -> Result<(), DownloadError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end <= start {
                return Err(DownloadError::InvalidEditParams(format!(
                    "end time {} must be after start time {}",
                    end, start
                )));
            }
        }

        if let Some(speed) = self.speed {
            if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
                return Err(DownloadError::InvalidEditParams(format!(
                    "speed {} must be between {} and {}",
                    speed, MIN_SPEED, MAX_SPEED
                )));
            }
        }

        if self.input.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(DownloadError::InvalidEditParams(
                "input and output paths are required".to_string(),
            ));
        }

        Ok(())
    }

    fn effective_speed(&self) -> Option<f64> {
        self.speed.filter(|s| (s - 1.0).abs() > f64::EPSILON)
    }

    fn has_video_options(&self) -> bool {
        self.crop.is_some() || self.scale.is_some() || self.watermark.is_some()
    }
}

/// Shortest decimal rendering ffmpeg accepts ("2", "1.5", "0.75")
fn fmt_factor(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// atempo stages whose product is `speed`, each within the filter's range
fn atempo_chain(speed: f64) -> Vec<String> {
    let mut stages = Vec::new();
    let mut remaining = speed;
    while remaining > ATEMPO_MAX {
        stages.push(format!("atempo={}", fmt_factor(ATEMPO_MAX)));
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(format!("atempo={}", fmt_factor(ATEMPO_MIN)));
        remaining /= ATEMPO_MIN;
    }
    stages.push(format!("atempo={}", fmt_factor(remaining)));
    stages
}

#[derive(Default)]
struct FilterGraph {
    chains: Vec<String>,
}

impl FilterGraph {
    fn push(&mut self, inputs: &[&str], filters: &[String], output: &str) {
        let inputs: String = inputs.iter().map(|i| format!("[{}]", i)).collect();
        self.chains
            .push(format!("{}{}[{}]", inputs, filters.join(","), output));
    }

    fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    fn render(&self) -> String {
        self.chains.join(";")
    }
}

/// Build the ffmpeg command for an edit job.
pub fn build_encode_command(job: &EncodeJob) -> Result<CommandVector, DownloadError> {
    job.validate()?;

    let audio_only = job.format.is_audio();
    if audio_only && job.has_video_options() {
        tracing::warn!("crop, scale and watermark are ignored for audio-only output");
    }

    let mut cmd = CommandVector::tool(ToolKind::Ffmpeg).arg("-y");

    // Trim applies to the main input only, before speed changes
    if let Some(start) = job.start.filter(|s| !s.is_zero()) {
        cmd = cmd.args(["-ss".to_string(), start.to_string()]);
    }
    if let Some(end) = job.end {
        cmd = cmd.args(["-to".to_string(), end.to_string()]);
    }
    cmd = cmd.arg("-i").path_arg(&job.input);

    let mut next_input = 1;
    let watermark_input = match &job.watermark {
        Some(wm) if !audio_only => {
            cmd = cmd.arg("-i").path_arg(&wm.path);
            next_input += 1;
            Some((next_input - 1, wm))
        }
        _ => None,
    };
    let music_input = match &job.music {
        Some(music) => {
            cmd = cmd.arg("-i").path_arg(music);
            Some(next_input)
        }
        None => None,
    };

    let mut graph = FilterGraph::default();

    // video branch
    let mut video_filtered = false;
    if !audio_only {
        let mut filters = Vec::new();
        if let Some(crop) = job.crop {
            filters.push(format!("crop={}", crop));
        }
        if let Some(scale) = job.scale {
            filters.push(format!("scale={}", scale));
        }
        if let Some(speed) = job.effective_speed() {
            filters.push(format!("setpts=PTS/{}", fmt_factor(speed)));
        }

        match watermark_input {
            Some((idx, wm)) => {
                let overlay_src = format!("{}:v", idx);
                let overlay = vec![format!("overlay={}:{}", wm.x, wm.y)];
                if filters.is_empty() {
                    graph.push(&["0:v", overlay_src.as_str()], &overlay, "vout");
                } else {
                    graph.push(&["0:v"], &filters, "vbase");
                    graph.push(&["vbase", overlay_src.as_str()], &overlay, "vout");
                }
                video_filtered = true;
            }
            None if !filters.is_empty() => {
                graph.push(&["0:v"], &filters, "vout");
                video_filtered = true;
            }
            None => {}
        }
    }

    // audio branch
    let mut audio_filtered = false;
    let tempo = job.effective_speed().map(atempo_chain).unwrap_or_default();
    match music_input {
        Some(idx) => {
            let music_src = format!("{}:a", idx);
            let mix = vec![AMIX.to_string()];
            if tempo.is_empty() {
                graph.push(&["0:a", music_src.as_str()], &mix, "aout");
            } else {
                graph.push(&["0:a"], &tempo, "abase");
                graph.push(&["abase", music_src.as_str()], &mix, "aout");
            }
            audio_filtered = true;
        }
        None if !tempo.is_empty() => {
            graph.push(&["0:a"], &tempo, "aout");
            audio_filtered = true;
        }
        None => {}
    }

    if !graph.is_empty() {
        cmd = cmd.args(["-filter_complex".to_string(), graph.render()]);
    }

    if audio_only {
        cmd = cmd
            .args(["-map", if audio_filtered { "[aout]" } else { "0:a" }])
            .arg("-vn")
            .args(["-c:a", "libmp3lame", "-q:a", "2"]);
    } else {
        cmd = cmd
            .args(["-map", if video_filtered { "[vout]" } else { "0:v" }])
            .args(["-map", if audio_filtered { "[aout]" } else { "0:a?" }]);
        cmd = if video_filtered {
            cmd.args(["-c:v", "libx264"])
        } else {
            cmd.args(["-c:v", "copy"])
        };
        cmd = if audio_filtered {
            cmd.args(["-c:a", "aac", "-b:a", "192k"])
        } else {
            cmd.args(["-c:a", "copy"])
        };
    }

    Ok(cmd.path_arg(&job.output))
}

/// H.264/AAC conversion for files the preview player cannot open
pub fn build_convert_command(input: &Path, output: &Path) -> CommandVector {
    CommandVector::tool(ToolKind::Ffmpeg)
        .arg("-y")
        .arg("-i")
        .path_arg(input)
        .args(["-c:v", "libx264", "-c:a", "aac"])
        .path_arg(output)
}

/// `<dir>/temp_converted_<stem>.mp4` next to `input`
pub fn temp_converted_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    input.with_file_name(format!("temp_converted_{}.mp4", stem))
}

/// `<dir>/<stem><suffix>.<ext>` next to `input`
pub fn sibling_output(input: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.{}", stem, suffix, ext))
}

pub fn build_extract_audio_command(input: &Path, output: &Path) -> CommandVector {
    CommandVector::tool(ToolKind::Ffmpeg)
        .arg("-y")
        .arg("-i")
        .path_arg(input)
        .args(["-vn", "-c:a", "libmp3lame", "-q:a", "0"])
        .path_arg(output)
}

pub fn build_screenshot_command(input: &Path, at: Timestamp, output: &Path) -> CommandVector {
    CommandVector::tool(ToolKind::Ffmpeg)
        .arg("-y")
        .args(["-ss".to_string(), at.to_string()])
        .arg("-i")
        .path_arg(input)
        .args(["-vframes", "1", "-q:v", "2"])
        .path_arg(output)
}

/// Concat demuxer list: one `file '<path>'` line per input
pub fn concat_list_contents(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| {
            let abs = std::path::absolute(p).unwrap_or_else(|_| p.clone());
            // concat lists escape a quote as '\''
            format!("file '{}'", abs.to_string_lossy().replace('\'', "'\\''"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stream-copy merge of everything listed in `list`, optionally trimmed.
pub fn build_concat_command(
    list: &Path,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    output: &Path,
) -> Result<CommandVector, DownloadError> {
    let start = start.unwrap_or_default();
    if let Some(end) = end {
        if end <= start {
            return Err(DownloadError::InvalidEditParams(format!(
                "end time {} must be after start time {}",
                end, start
            )));
        }
    }

    let mut cmd = CommandVector::tool(ToolKind::Ffmpeg)
        .arg("-y")
        .args(["-f", "concat", "-safe", "0"])
        .arg("-i")
        .path_arg(list)
        .args(["-c", "copy"]);

    if !start.is_zero() {
        cmd = cmd.args(["-ss".to_string(), start.to_string()]);
    }
    if let Some(end) = end {
        let duration = Timestamp(end.0 - start.0);
        cmd = cmd.args(["-t".to_string(), duration.to_string()]);
    }

    Ok(cmd.path_arg(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job() -> EncodeJob {
        EncodeJob::new("/v/in.mp4", "/v/out.mp4")
    }

    fn maps(cmd: &CommandVector) -> Vec<&str> {
        cmd.args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect()
    }

    fn inputs(cmd: &CommandVector) -> usize {
        cmd.args.iter().filter(|a| *a == "-i").count()
    }

    #[test]
    fn plain_job_stream_copies_with_explicit_maps() {
        let cmd = build_encode_command(&job()).unwrap();
        assert!(!cmd.has_flag("-filter_complex"));
        assert_eq!(maps(&cmd), vec!["0:v", "0:a?"]);
        assert_eq!(cmd.value_of("-c:v"), Some("copy"));
        assert_eq!(cmd.value_of("-c:a"), Some("copy"));
        assert_eq!(cmd.args.last().unwrap(), "/v/out.mp4");
    }

    #[test]
    fn crop_and_scale_share_one_chain() {
        let mut j = job();
        j.crop = Some("640:360:0:0".parse().unwrap());
        j.scale = Some("1280x720".parse().unwrap());
        let cmd = build_encode_command(&j).unwrap();
        assert_eq!(
            cmd.value_of("-filter_complex"),
            Some("[0:v]crop=640:360:0:0,scale=1280:720[vout]")
        );
        assert_eq!(maps(&cmd), vec!["[vout]", "0:a?"]);
        assert_eq!(cmd.value_of("-c:v"), Some("libx264"));
        assert_eq!(cmd.value_of("-c:a"), Some("copy"));
    }

    #[test]
    fn watermark_and_music_compose() {
        let mut j = job();
        j.crop = Some("640:360:0:0".parse().unwrap());
        j.watermark = Some(Watermark::new("/v/logo.png").at(20, 30));
        j.music = Some(PathBuf::from("/v/bgm.mp3"));
        let cmd = build_encode_command(&j).unwrap();

        assert_eq!(inputs(&cmd), 3);
        assert_eq!(
            cmd.value_of("-filter_complex"),
            Some(
                "[0:v]crop=640:360:0:0[vbase];[vbase][1:v]overlay=20:30[vout];\
                 [0:a][2:a]amix=inputs=2:duration=first:dropout_transition=2[aout]"
            )
        );
        assert_eq!(maps(&cmd), vec!["[vout]", "[aout]"]);
        assert_eq!(cmd.value_of("-c:a"), Some("aac"));
    }

    #[test]
    fn music_only_still_maps_video() {
        let mut j = job();
        j.music = Some(PathBuf::from("/v/bgm.mp3"));
        let cmd = build_encode_command(&j).unwrap();
        assert_eq!(inputs(&cmd), 2);
        assert_eq!(maps(&cmd), vec!["0:v", "[aout]"]);
        assert_eq!(cmd.value_of("-c:v"), Some("copy"));
    }

    #[test]
    fn every_multi_input_or_filtered_job_maps_explicitly() {
        let mut variants = Vec::new();
        let mut j = job();
        j.watermark = Some(Watermark::new("/v/logo.png"));
        variants.push(j);
        let mut j = job();
        j.speed = Some(1.5);
        variants.push(j);
        let mut j = job();
        j.music = Some(PathBuf::from("/v/bgm.mp3"));
        j.speed = Some(0.5);
        variants.push(j);

        for j in variants {
            let cmd = build_encode_command(&j).unwrap();
            assert!(inputs(&cmd) > 1 || cmd.has_flag("-filter_complex"));
            assert_eq!(maps(&cmd).len(), 2, "{}", cmd.display());
        }
    }

    #[test]
    fn speed_changes_video_and_audio() {
        let mut j = job();
        j.speed = Some(4.0);
        let cmd = build_encode_command(&j).unwrap();
        assert_eq!(
            cmd.value_of("-filter_complex"),
            Some("[0:v]setpts=PTS/4[vout];[0:a]atempo=2,atempo=2[aout]")
        );
        assert_eq!(atempo_chain(0.25), vec!["atempo=0.5", "atempo=0.5"]);
        assert_eq!(atempo_chain(1.5), vec!["atempo=1.5"]);
    }

    #[test]
    fn trim_goes_on_main_input() {
        let mut j = job();
        j.start = Some("00:00:05".parse().unwrap());
        j.end = Some("00:00:10".parse().unwrap());
        let cmd = build_encode_command(&j).unwrap();
        assert_eq!(
            &cmd.args[..6],
            &["-y", "-ss", "00:00:05.000", "-to", "00:00:10.000", "-i"]
        );
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut j = job();
        j.speed = Some(5.0);
        assert!(matches!(
            build_encode_command(&j),
            Err(DownloadError::InvalidEditParams(_))
        ));

        let mut j = job();
        j.start = Some(Timestamp(Duration::from_secs(10)));
        j.end = Some(Timestamp(Duration::from_secs(5)));
        assert!(build_encode_command(&j).is_err());
    }

    #[test]
    fn audio_only_output() {
        let mut j = EncodeJob::new("/v/in.mp4", "/v/out.mp3");
        j.format = OutputFormat::Mp3;
        j.crop = Some("640:360:0:0".parse().unwrap());
        let cmd = build_encode_command(&j).unwrap();
        assert!(!cmd.has_flag("-filter_complex"));
        assert_eq!(maps(&cmd), vec!["0:a"]);
        assert!(cmd.has_flag("-vn"));
        assert_eq!(cmd.value_of("-c:a"), Some("libmp3lame"));
    }

    #[test]
    fn fixed_jobs() {
        let input = Path::new("/v/clip.mkv");
        let cmd = build_convert_command(input, Path::new("/v/clip.mp4"));
        assert_eq!(cmd.value_of("-c:v"), Some("libx264"));
        assert_eq!(cmd.value_of("-c:a"), Some("aac"));

        assert_eq!(
            temp_converted_path(input),
            PathBuf::from("/v/temp_converted_clip.mp4")
        );
        assert_eq!(
            sibling_output(input, "_merged", "mp4"),
            PathBuf::from("/v/clip_merged.mp4")
        );

        let cmd = build_extract_audio_command(input, Path::new("/v/clip.mp3"));
        assert_eq!(cmd.value_of("-q:a"), Some("0"));
        assert!(cmd.has_flag("-vn"));

        let cmd = build_screenshot_command(
            input,
            Timestamp(Duration::from_millis(1500)),
            Path::new("/v/shot.png"),
        );
        assert_eq!(
            cmd.args,
            vec!["-y", "-ss", "00:00:01.500", "-i", "/v/clip.mkv", "-vframes", "1", "-q:v", "2", "/v/shot.png"]
        );
    }

    #[test]
    fn concat_merge() {
        let list = concat_list_contents(&[PathBuf::from("/v/a.mp4"), PathBuf::from("/v/it's.mp4")]);
        assert_eq!(list, "file '/v/a.mp4'\nfile '/v/it'\\''s.mp4'");

        let cmd = build_concat_command(
            Path::new("/tmp/list.txt"),
            Some(Timestamp(Duration::from_secs(2))),
            Some(Timestamp(Duration::from_secs(7))),
            Path::new("/v/merged.mp4"),
        )
        .unwrap();
        assert_eq!(cmd.value_of("-f"), Some("concat"));
        assert_eq!(cmd.value_of("-safe"), Some("0"));
        assert_eq!(cmd.value_of("-ss"), Some("00:00:02.000"));
        assert_eq!(cmd.value_of("-t"), Some("00:00:05.000"));

        assert!(build_concat_command(
            Path::new("/tmp/list.txt"),
            Some(Timestamp(Duration::from_secs(7))),
            Some(Timestamp(Duration::from_secs(2))),
            Path::new("/v/merged.mp4"),
        )
        .is_err());
    }
}
