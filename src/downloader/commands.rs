// yt-dlp argument vectors
//
// Commands are always structured argument lists. `display()` joins them for the
// log pane only; nothing here is ever handed to a shell.

use std::path::{Path, PathBuf};

use super::models::{DownloadSpec, OutputFormat};
use super::platform::Platform;
use super::tools::ToolKind;

/// Fallback selector when no concrete format id is known
pub const BEST_VIDEO_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best";

/// Stream copy during the merge step, avoids re-encoding
const MERGE_POSTPROCESSOR_ARGS: &str = "ffmpeg:-c:v copy -c:a copy";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// TikTok extractor overrides. Versioned as a block; do not edit single entries.
const TIKTOK_EXTRACTOR_ARGS: &[&str] = &[
    "tiktok:api_hostname=api22-normal-c-useast1a.tiktokv.com",
    "tiktok:app_version=22.1.3",
    "tiktok:device_id=7163339161873573377",
    "tiktok:manifest_app_version=22.1.3",
    "tiktok:api_url=https://api22-normal-c-useast1a.tiktokv.com/passport/web/user/query/",
    "tiktok:api_key=aweme_v3_web",
];

const INSTAGRAM_EXTRACTOR_ARGS: &[&str] = &[
    "instagram:login_required=False",
    "instagram:include_stories=True",
    "instagram:include_highlights=True",
    "instagram:include_posts=True",
    "instagram:include_reels=True",
    "instagram:include_igtv=True",
    "instagram:max_posts=1",
    "instagram:max_stories=1",
    "instagram:max_highlights=1",
    "instagram:max_reels=1",
    "instagram:max_igtv=1",
];

/// Executable a command runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// Resolved through the tool manager at spawn time
    Tool(ToolKind),
    /// Run as given (player, test doubles)
    Path(PathBuf),
}

impl Program {
    pub fn name(&self) -> String {
        match self {
            Program::Tool(kind) => kind.as_str().to_string(),
            Program::Path(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandVector {
    pub program: Program,
    pub args: Vec<String>,
}

impl CommandVector {
    pub fn tool(kind: ToolKind) -> Self {
        Self {
            program: Program::Tool(kind),
            args: Vec::new(),
        }
    }

    pub fn program(path: impl Into<PathBuf>) -> Self {
        Self {
            program: Program::Path(path.into()),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following the first occurrence of `flag`
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Shell-like rendering for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.name())
            .chain(self.args.iter().cloned())
            .map(|a| quote_for_display(&a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_for_display(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || "\"'$&|;<>()*?[]".contains(c)) {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
}

fn with_tiktok_block(cmd: CommandVector) -> CommandVector {
    TIKTOK_EXTRACTOR_ARGS
        .iter()
        .fold(cmd, |cmd, arg| cmd.arg("--extractor-args").arg(*arg))
}

/// Output template inside `dir`. TikTok titles collide, so date and id are appended.
pub fn output_template(dir: &Path, platform: Platform) -> String {
    let name = match platform {
        Platform::TikTok => "%(title)s_%(upload_date)s_%(id)s.%(ext)s",
        _ => "%(title)s.%(ext)s",
    };
    dir.join(name).to_string_lossy().into_owned()
}

pub fn build_download_command(spec: &DownloadSpec) -> CommandVector {
    let mut cmd = CommandVector::tool(ToolKind::YtDlp).arg("--no-cache-dir");

    if spec.platform == Platform::TikTok {
        cmd = with_tiktok_block(cmd)
            .args(["--user-agent", BROWSER_USER_AGENT])
            .arg("--no-check-certificate");
        if spec.live {
            cmd = cmd.arg("--live-from-start");
        }
    }

    if spec.embed_thumbnail {
        cmd = cmd.arg("--embed-thumbnail");
    }
    if spec.embed_metadata {
        cmd = cmd.arg("--embed-metadata");
    }

    let template = output_template(&spec.output_dir, spec.platform);

    let cmd = match spec.format {
        OutputFormat::Mp3 => cmd.args(["-x", "--audio-format", "mp3"]),
        OutputFormat::Mp4 => {
            let selector = spec.format_id.as_deref().unwrap_or(BEST_VIDEO_SELECTOR);
            cmd.args(["-f", selector])
                .args(["--merge-output-format", "mp4"])
                .args(["--postprocessor-args", MERGE_POSTPROCESSOR_ARGS])
        }
    };

    cmd.args(["-o", template.as_str()]).arg(spec.url.as_str())
}

/// Metadata dump (`--dump-json`). Instagram needs its own extractor block and a
/// slash-terminated URL without query.
pub fn build_probe_command(url: &str, platform: Platform) -> CommandVector {
    let cmd = CommandVector::tool(ToolKind::YtDlp).arg("--dump-json");

    if platform != Platform::Instagram {
        return cmd.arg(url);
    }

    let base = url.split('?').next().unwrap_or(url);
    let url = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };

    INSTAGRAM_EXTRACTOR_ARGS
        .iter()
        .fold(cmd, |cmd, arg| cmd.arg("--extractor-args").arg(*arg))
        .args(["--no-check-certificate", "--no-warnings"])
        .arg(url)
}

/// Human-readable format table (`-F`)
pub fn build_format_list_command(url: &str) -> CommandVector {
    CommandVector::tool(ToolKind::YtDlp).arg("-F").arg(url)
}

/// Dry run against a TikTok live page; the output tells whether the channel is live.
pub fn build_live_check_command(url: &str) -> CommandVector {
    with_tiktok_block(CommandVector::tool(ToolKind::YtDlp).arg("--no-cache-dir"))
        .arg("--skip-download")
        .arg(url)
}
