// Child process execution with streamed output

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;

use super::commands::{CommandVector, Program};
use super::models::ProcessResult;
use super::tools::{ToolKind, ToolManager};

/// How a streamed line is shown in the log pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Progress,
    Info,
    Debug,
}

impl LineKind {
    pub fn of(program: &Program, line: &str) -> Self {
        match program {
            Program::Tool(ToolKind::Ffmpeg) => {
                if line.contains("time=") && line.contains("speed=") {
                    LineKind::Progress
                } else {
                    LineKind::Info
                }
            }
            _ => {
                if line.contains('%') || line.contains("Downloading") || line.contains("ETA") {
                    LineKind::Progress
                } else {
                    LineKind::Debug
                }
            }
        }
    }
}

/// Runs a command to completion, handing every output line to `on_line` in order.
///
/// Never fails: spawn errors come back as a synthetic line plus exit code -1,
/// an expired `timeout` kills the child and yields a `Timeout` result.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        cmd: &CommandVector,
        on_line: &mut (dyn FnMut(String) + Send),
        timeout: Option<Duration>,
    ) -> ProcessResult;
}

/// Real child processes via tokio
pub struct ProcessRunner {
    tools: ToolManager,
}

impl ProcessRunner {
    pub fn new(tools: ToolManager) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        cmd: &CommandVector,
        on_line: &mut (dyn FnMut(String) + Send),
        timeout: Option<Duration>,
    ) -> ProcessResult {
        let program = match &cmd.program {
            Program::Tool(kind) => self.tools.resolve(*kind),
            Program::Path(path) => path.clone(),
        };

        tracing::debug!(command = %cmd.display(), "spawning");

        let mut child = match TokioCommand::new(&program)
            .args(&cmd.args)
            .env("PATH", self.tools.search_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program = %program.display(), error = %e, "spawn failed");
                on_line(format!("Failed to start {}: {}", program.display(), e));
                return ProcessResult::spawn_failed(1);
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump_lines(stderr, tx.clone())));
        }
        drop(tx);

        let mut line_count = 0usize;
        let streamed = async {
            while let Some(line) = rx.recv().await {
                line_count += 1;
                on_line(line);
            }
            child.wait().await
        };

        let waited = match timeout {
            Some(limit) => match tokio::time::timeout(limit, streamed).await {
                Ok(status) => status,
                Err(_) => {
                    let _ = child.kill().await;
                    for reader in &readers {
                        reader.abort();
                    }
                    tracing::warn!(
                        command = %cmd.display(),
                        secs = limit.as_secs(),
                        "killed after timeout"
                    );
                    return ProcessResult::timed_out(line_count);
                }
            },
            None => streamed.await,
        };

        match waited {
            Ok(status) => {
                tracing::debug!(code = ?status.code(), lines = line_count, "process exited");
                ProcessResult::from_exit(status.code(), line_count)
            }
            Err(e) => {
                on_line(format!("Failed to wait for {}: {}", program.display(), e));
                ProcessResult::spawn_failed(line_count + 1)
            }
        }
    }
}

/// Forward `reader` line by line. Both `\n` and `\r` end a line so that
/// carriage-return progress bars arrive as separate updates.
async fn pump_lines<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                flush_line(&mut pending, &tx);
            } else {
                pending.push(byte);
            }
        }
    }
    flush_line(&mut pending, &tx);
}

fn flush_line(pending: &mut Vec<u8>, tx: &mpsc::UnboundedSender<String>) {
    let line = String::from_utf8_lossy(pending).trim().to_string();
    pending.clear();
    if !line.is_empty() {
        let _ = tx.send(line);
    }
}
