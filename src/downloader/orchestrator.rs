// Orchestrator - multi-step scenarios over the process runner
//
// Each user action maps to a scenario: probe, download, convert (optionally
// chained into the player), edit, merge, audio extraction, screenshot. A
// scenario runs on its own task and reports back through `WorkerEvent`s; the
// front end never waits on a child process.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::commands::{self, CommandVector};
use super::encode::{self, EncodeJob};
use super::errors::DownloadError;
use super::format_selector;
use super::models::{DownloadSpec, OutputFormat, ProbeInfo, ProcessResult, ProcessStatus, Quality, Timestamp};
use super::platform::{self, Platform};
use super::runner::{CommandRunner, LineKind};
use super::tools::ToolKind;
use super::url::normalize;
use crate::logging::{LogLevel, LogQueue};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
pub const FORMAT_LIST_TIMEOUT: Duration = Duration::from_secs(20);
pub const LIVE_CHECK_TIMEOUT: Duration = Duration::from_secs(20);
const TOOL_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

const NOT_LIVE_MARKER: &str = "The channel is not currently live";

/// The UI control a request belongs to. One request per control at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Probe,
    Download,
    Convert,
    Edit,
    Merge,
    ExtractAudio,
    Screenshot,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Control::Probe => "quality probe",
            Control::Download => "download",
            Control::Convert => "conversion",
            Control::Edit => "edit",
            Control::Merge => "merge",
            Control::ExtractAudio => "audio extraction",
            Control::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Per-control request state: `Idle → Running → {Succeeded, Failed}`
#[derive(Debug, Clone, Default)]
pub struct RequestBoard {
    states: Arc<Mutex<HashMap<Control, RequestState>>>,
}

impl RequestBoard {
    fn lock(&self) -> MutexGuard<'_, HashMap<Control, RequestState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self, control: Control) -> RequestState {
        self.lock()
            .get(&control)
            .copied()
            .unwrap_or(RequestState::Idle)
    }

    pub fn is_running(&self, control: Control) -> bool {
        self.state(control) == RequestState::Running
    }

    /// Mark `control` running, or refuse while a previous request is unfinished.
    pub fn begin(&self, control: Control) -> Result<RequestGuard, DownloadError> {
        let mut states = self.lock();
        if states.get(&control) == Some(&RequestState::Running) {
            return Err(DownloadError::Busy(control.to_string()));
        }
        states.insert(control, RequestState::Running);
        drop(states);

        Ok(RequestGuard {
            board: self.clone(),
            control,
            settled: false,
        })
    }

    fn settle(&self, control: Control, state: RequestState) {
        self.lock().insert(control, state);
    }
}

/// Running request. Dropping it unsettled (panic, abort) marks the request failed.
#[derive(Debug)]
pub struct RequestGuard {
    board: RequestBoard,
    control: Control,
    settled: bool,
}

impl RequestGuard {
    pub fn control(&self) -> Control {
        self.control
    }

    pub fn succeed(mut self) {
        self.board.settle(self.control, RequestState::Succeeded);
        self.settled = true;
    }

    pub fn fail(mut self) {
        self.board.settle(self.control, RequestState::Failed);
        self.settled = true;
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.board.settle(self.control, RequestState::Failed);
        }
    }
}

/// Results delivered to the front end
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    QualitiesReady(ProbeInfo),
    /// `output` is the produced file, or the output directory for downloads
    Completed { control: Control, output: PathBuf },
    Failed { control: Control, error: DownloadError },
    LoadIntoPlayer { path: PathBuf },
    /// URL pushed by the remote control server, already normalized
    RemoteDownload { url: String },
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Whatever the user pasted; normalized by the scenario
    pub text: String,
    pub format: OutputFormat,
    pub quality: Quality,
    pub output_dir: PathBuf,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
}

impl DownloadRequest {
    pub fn new(text: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            format: OutputFormat::Mp4,
            quality: Quality::Auto,
            output_dir: output_dir.into(),
            embed_metadata: false,
            embed_thumbnail: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Request {
    Probe {
        text: String,
    },
    Download(DownloadRequest),
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Open the result in the preview player afterwards
        load: bool,
    },
    Edit(EncodeJob),
    Merge {
        inputs: Vec<PathBuf>,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        output: PathBuf,
    },
    ExtractAudio {
        input: PathBuf,
        output: PathBuf,
    },
    Screenshot {
        input: PathBuf,
        at: Timestamp,
        output: PathBuf,
    },
}

impl Request {
    pub fn control(&self) -> Control {
        match self {
            Request::Probe { .. } => Control::Probe,
            Request::Download(_) => Control::Download,
            Request::Convert { .. } => Control::Convert,
            Request::Edit(_) => Control::Edit,
            Request::Merge { .. } => Control::Merge,
            Request::ExtractAudio { .. } => Control::ExtractAudio,
            Request::Screenshot { .. } => Control::Screenshot,
        }
    }
}

/// What a finished child left behind, for error reporting
struct StepOutput {
    result: ProcessResult,
    timeout: Option<Duration>,
    /// Last `ERROR:` line printed by yt-dlp
    last_error: Option<String>,
    last_line: Option<String>,
}

impl StepOutput {
    fn into_result(self, cmd: &CommandVector) -> Result<(), DownloadError> {
        match self.result.status {
            ProcessStatus::Success => Ok(()),
            ProcessStatus::Timeout => Err(DownloadError::Timeout(
                self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            )),
            ProcessStatus::Failure => {
                if let Some(line) = self.last_error {
                    return Err(DownloadError::from(line));
                }
                let code = self
                    .result
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string());
                let detail = self
                    .last_line
                    .map(|l| format!(": {}", l))
                    .unwrap_or_default();
                Err(DownloadError::ExecutionError(format!(
                    "{} exited with code {}{}",
                    cmd.program.name(),
                    code,
                    detail
                )))
            }
        }
    }
}

enum Outcome {
    Probed(ProbeInfo),
    Produced { output: PathBuf, load: bool },
}

/// Runs scenarios and reports through the worker event channel
#[derive(Clone)]
pub struct Sequencer {
    runner: Arc<dyn CommandRunner>,
    logs: LogQueue,
    events: UnboundedSender<WorkerEvent>,
    board: RequestBoard,
    probe_timeout: Duration,
}

impl Sequencer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        logs: LogQueue,
        events: UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            runner,
            logs,
            events,
            board: RequestBoard::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn board(&self) -> &RequestBoard {
        &self.board
    }

    pub fn logs(&self) -> &LogQueue {
        &self.logs
    }

    /// Extra producer for the result channel (remote control)
    pub fn event_sender(&self) -> UnboundedSender<WorkerEvent> {
        self.events.clone()
    }

    /// Start `request` on its own task. Refused with `Busy` while the same
    /// control still has a request running.
    pub fn submit(&self, request: Request) -> Result<JoinHandle<()>, DownloadError> {
        let guard = self.board.begin(request.control())?;
        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.execute(request, guard).await;
        }))
    }

    async fn execute(&self, request: Request, guard: RequestGuard) {
        let control = guard.control();

        let outcome = match request {
            Request::Probe { text } => self.probe(&text).await.map(Outcome::Probed),
            Request::Download(req) => self.download(req).await.map(|output| Outcome::Produced {
                output,
                load: false,
            }),
            Request::Convert {
                input,
                output,
                load,
            } => self
                .convert(&input, &output)
                .await
                .map(|output| Outcome::Produced { output, load }),
            Request::Edit(job) => self.edit(&job).await.map(|output| Outcome::Produced {
                output,
                load: false,
            }),
            Request::Merge {
                inputs,
                start,
                end,
                output,
            } => self
                .merge(&inputs, start, end, &output)
                .await
                .map(|output| Outcome::Produced {
                    output,
                    load: false,
                }),
            Request::ExtractAudio { input, output } => self
                .extract_audio(&input, &output)
                .await
                .map(|output| Outcome::Produced {
                    output,
                    load: false,
                }),
            Request::Screenshot { input, at, output } => self
                .screenshot(&input, at, &output)
                .await
                .map(|output| Outcome::Produced {
                    output,
                    load: false,
                }),
        };

        // settle before notifying so the control is usable when the event arrives
        match outcome {
            Ok(Outcome::Probed(info)) => {
                guard.succeed();
                self.emit(WorkerEvent::QualitiesReady(info));
            }
            Ok(Outcome::Produced { output, load }) => {
                guard.succeed();
                self.emit(WorkerEvent::Completed {
                    control,
                    output: output.clone(),
                });
                if load {
                    self.emit(WorkerEvent::LoadIntoPlayer { path: output });
                }
            }
            Err(error) => {
                guard.fail();
                self.logs.error(format!("{} failed: {}", control, error));
                self.emit(WorkerEvent::Failed { control, error });
            }
        }
    }

    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event receiver gone, dropping worker event");
        }
    }

    /// Stream a step into the log pane
    async fn run_logged(&self, cmd: &CommandVector, timeout: Option<Duration>) -> StepOutput {
        self.logs.debug(format!("running: {}", cmd.display()));

        let logs = self.logs.clone();
        let program = cmd.program.clone();
        let mut last_error = None;
        let mut last_line = None;
        let mut on_line = |line: String| {
            if line.starts_with("ERROR") {
                last_error = Some(line.clone());
            }
            last_line = Some(line.clone());
            let level = match LineKind::of(&program, &line) {
                LineKind::Progress | LineKind::Info => LogLevel::Info,
                LineKind::Debug => LogLevel::Debug,
            };
            logs.push(level, line);
        };

        let result = self.runner.run(cmd, &mut on_line, timeout).await;
        StepOutput {
            result,
            timeout,
            last_error,
            last_line,
        }
    }

    /// Collect a step's output for parsing. JSON bodies stay out of the log pane.
    async fn run_captured(
        &self,
        cmd: &CommandVector,
        timeout: Option<Duration>,
    ) -> (ProcessResult, Vec<String>) {
        self.logs.debug(format!("running: {}", cmd.display()));

        let logs = self.logs.clone();
        let mut lines = Vec::new();
        let mut on_line = |line: String| {
            if !line.starts_with('{') {
                logs.debug(line.clone());
            }
            lines.push(line);
        };

        let result = self.runner.run(cmd, &mut on_line, timeout).await;
        (result, lines)
    }

    async fn check_tool(&self, kind: ToolKind) -> Result<(), DownloadError> {
        let cmd = CommandVector::tool(kind).arg(kind.version_arg());
        let result = self
            .runner
            .run(&cmd, &mut |_line: String| {}, Some(TOOL_CHECK_TIMEOUT))
            .await;
        if result.success() {
            Ok(())
        } else {
            Err(DownloadError::tool_not_found(kind.as_str()))
        }
    }

    /// Quality probe. Never fails on tool output: timeouts, non-zero exits
    /// and malformed JSON all fall back to the default ladder.
    pub async fn probe(&self, text: &str) -> Result<ProbeInfo, DownloadError> {
        let url = normalize(text);
        if url.trim().is_empty() {
            return Err(DownloadError::InvalidUrl("please enter a video URL".to_string()));
        }

        let platform = platform::classify(&url);
        let cmd = commands::build_probe_command(&url, platform);
        let (result, lines) = self.run_captured(&cmd, Some(self.probe_timeout)).await;

        match result.status {
            ProcessStatus::Success => {}
            ProcessStatus::Timeout => {
                self.logs.debug(format!(
                    "quality probe timed out after {}s, offering default qualities",
                    self.probe_timeout.as_secs()
                ));
                return Ok(format_selector::default_probe());
            }
            ProcessStatus::Failure => {
                self.logs.debug(format!(
                    "quality probe exited with code {:?}, offering default qualities",
                    result.exit_code
                ));
                return Ok(format_selector::default_probe());
            }
        }

        match format_selector::parse_probe_json(&lines.join("\n")) {
            Ok(info) => {
                if let Some(title) = &info.title {
                    self.logs.info(format!("title: {}", title));
                }
                if info.fell_back {
                    self.logs.debug("no video formats reported, offering default qualities");
                }
                Ok(info)
            }
            Err(e) => {
                self.logs
                    .debug(format!("{}, offering default qualities", e));
                Ok(format_selector::default_probe())
            }
        }
    }

    /// Format id for `quality` from the `-F` table, `None` to let yt-dlp choose.
    pub async fn resolve_format_id(
        &self,
        url: &str,
        quality: &Quality,
        platform: Platform,
    ) -> Option<String> {
        let label = quality.label()?;
        let cmd = commands::build_format_list_command(url);
        let (result, lines) = self.run_captured(&cmd, Some(FORMAT_LIST_TIMEOUT)).await;

        if result.status == ProcessStatus::Timeout {
            self.logs
                .debug(format!("format listing timed out, selecting {} automatically", label));
            return None;
        }

        let id = format_selector::resolve_format_id(&lines.join("\n"), quality, platform);
        match &id {
            Some(id) => self.logs.debug(format!("{} → format {}", label, id)),
            None => self
                .logs
                .debug(format!("no format matches {}, selecting automatically", label)),
        }
        id
    }

    async fn ensure_live(&self, url: &str) -> Result<(), DownloadError> {
        let cmd = commands::build_live_check_command(url);
        let (result, lines) = self.run_captured(&cmd, Some(LIVE_CHECK_TIMEOUT)).await;

        if result.status == ProcessStatus::Timeout {
            return Err(DownloadError::Timeout(LIVE_CHECK_TIMEOUT.as_secs()));
        }
        if lines.iter().any(|l| l.contains(NOT_LIVE_MARKER)) {
            return Err(DownloadError::InvalidUrl(
                "the channel is not currently live, try again once the broadcast starts"
                    .to_string(),
            ));
        }
        self.logs.info("live broadcast detected, recording from the start");
        Ok(())
    }

    /// Download scenario. Returns the output directory.
    pub async fn download(&self, req: DownloadRequest) -> Result<PathBuf, DownloadError> {
        let url = normalize(&req.text);
        let platform = platform::validate(&req.text, &url)?;

        if !platform.output_formats().contains(&req.format) {
            return Err(DownloadError::InvalidEditParams(format!(
                "{} is not offered for {}",
                req.format, platform
            )));
        }

        self.check_tool(ToolKind::YtDlp).await?;
        self.check_tool(ToolKind::Ffmpeg).await?;

        let mut spec = DownloadSpec::new(url, req.output_dir)
            .with_format(req.format)
            .with_quality(req.quality)
            .with_embed_metadata(req.embed_metadata)
            .with_embed_thumbnail(req.embed_thumbnail);

        if spec.live {
            self.ensure_live(&spec.url).await?;
        }

        if !spec.format.is_audio() {
            let id = self
                .resolve_format_id(&spec.url, &spec.quality, spec.platform)
                .await;
            spec = spec.with_format_id(id);
        }

        let cmd = commands::build_download_command(&spec);
        self.logs
            .info(format!("downloading {} ({})", spec.url, spec.platform));
        self.run_logged(&cmd, None).await.into_result(&cmd)?;

        self.logs.info("download complete");
        Ok(spec.output_dir)
    }

    pub async fn convert(&self, input: &Path, output: &Path) -> Result<PathBuf, DownloadError> {
        self.check_tool(ToolKind::Ffmpeg).await?;

        let cmd = encode::build_convert_command(input, output);
        self.logs
            .info(format!("converting {} → {}", input.display(), output.display()));
        self.run_logged(&cmd, None).await.into_result(&cmd)?;

        self.logs.info("conversion complete");
        Ok(output.to_path_buf())
    }

    pub async fn edit(&self, job: &EncodeJob) -> Result<PathBuf, DownloadError> {
        let cmd = encode::build_encode_command(job)?;
        self.check_tool(ToolKind::Ffmpeg).await?;

        self.logs.info(format!("processing {}", job.input.display()));
        self.run_logged(&cmd, None).await.into_result(&cmd)?;

        self.logs.info("processing complete");
        Ok(job.output.clone())
    }

    /// Concat merge through a temporary list file, removed whatever the outcome.
    pub async fn merge(
        &self,
        inputs: &[PathBuf],
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        output: &Path,
    ) -> Result<PathBuf, DownloadError> {
        if inputs.len() < 2 {
            return Err(DownloadError::InvalidEditParams(
                "merging needs at least two files".to_string(),
            ));
        }

        let list = merge_list_path();
        let cmd = encode::build_concat_command(&list, start, end, output)?;
        self.check_tool(ToolKind::Ffmpeg).await?;

        tokio::fs::write(&list, encode::concat_list_contents(inputs)).await?;
        self.logs.debug(format!("merge list: {}", list.display()));
        self.logs.info(format!("merging {} files", inputs.len()));

        let outcome = self.run_logged(&cmd, None).await.into_result(&cmd);

        if let Err(e) = tokio::fs::remove_file(&list).await {
            tracing::warn!(path = %list.display(), error = %e, "could not remove merge list");
        }

        outcome?;
        self.logs.info("merge complete");
        Ok(output.to_path_buf())
    }

    pub async fn extract_audio(&self, input: &Path, output: &Path) -> Result<PathBuf, DownloadError> {
        self.check_tool(ToolKind::Ffmpeg).await?;

        let cmd = encode::build_extract_audio_command(input, output);
        self.logs.info("extracting audio");
        self.run_logged(&cmd, None).await.into_result(&cmd)?;

        self.logs.info(format!("audio saved to {}", output.display()));
        Ok(output.to_path_buf())
    }

    pub async fn screenshot(
        &self,
        input: &Path,
        at: Timestamp,
        output: &Path,
    ) -> Result<PathBuf, DownloadError> {
        self.check_tool(ToolKind::Ffmpeg).await?;

        let cmd = encode::build_screenshot_command(input, at, output);
        self.logs.info(format!("capturing frame at {}", at));
        self.run_logged(&cmd, None).await.into_result(&cmd)?;

        self.logs.info(format!("screenshot saved to {}", output.display()));
        Ok(output.to_path_buf())
    }
}

fn merge_list_path() -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    std::env::temp_dir().join(format!(
        "clipfetch_merge_{}_{}.txt",
        std::process::id(),
        stamp
    ))
}
