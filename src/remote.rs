// Remote control client
//
// Keeps one TCP connection to the control server and turns `ytdlp <url>` lines
// into download requests. The channel is plaintext and unauthenticated: anyone
// who can reach the configured address can make this process download things.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::downloader::orchestrator::WorkerEvent;
use crate::downloader::url::normalize;
use crate::logging::LogQueue;

pub const COMMAND_PREFIX: &str = "ytdlp ";
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(3);
/// Longest control line accepted; a longer one drops the connection
pub const MAX_LINE_LEN: u64 = 4096;

/// Canonical URL carried by a control line, `None` for anything else.
pub fn parse_command(line: &str) -> Option<String> {
    let raw = line.trim().strip_prefix(COMMAND_PREFIX)?.trim();
    if raw.is_empty() {
        return None;
    }
    let url = normalize(raw);
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

pub struct RemoteClient {
    addr: String,
    events: UnboundedSender<WorkerEvent>,
    logs: LogQueue,
    reconnect_interval: Duration,
}

impl RemoteClient {
    pub fn new(addr: impl Into<String>, events: UnboundedSender<WorkerEvent>, logs: LogQueue) -> Self {
        Self {
            addr: addr.into(),
            events,
            logs,
            reconnect_interval: RECONNECT_INTERVAL,
        }
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Connect, listen, reconnect forever. Returns once nobody receives events.
    pub async fn run(self) {
        tracing::warn!(
            addr = %self.addr,
            "remote control enabled: commands from this address are not authenticated"
        );

        let mut connected = false;
        loop {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    if !connected {
                        self.logs.debug(format!("connected to control server {}", self.addr));
                        connected = true;
                    }
                    if !self.listen(stream).await {
                        return;
                    }
                    self.logs.debug("control server closed the connection");
                }
                Err(e) => {
                    if connected {
                        self.logs.debug(format!(
                            "control server unreachable: {}, retrying in {}s",
                            e,
                            self.reconnect_interval.as_secs()
                        ));
                        connected = false;
                    }
                }
            }
            if self.events.is_closed() {
                return;
            }
            tokio::time::sleep(self.reconnect_interval).await;
        }
    }

    /// Read commands until the connection drops. `false` when the event receiver is gone.
    async fn listen(&self, stream: TcpStream) -> bool {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = (&mut reader)
                .take(MAX_LINE_LEN + 1)
                .read_until(b'\n', &mut buf)
                .await;
            match read {
                Ok(0) => return true,
                Ok(_) => {
                    if !buf.ends_with(b"\n") && buf.len() as u64 > MAX_LINE_LEN {
                        tracing::warn!(limit = MAX_LINE_LEN, "control line too long, dropping connection");
                        return true;
                    }
                    let line = String::from_utf8_lossy(&buf);
                    let Some(url) = parse_command(&line) else {
                        continue;
                    };
                    self.logs.debug(format!("remote download request: {}", url));
                    if self.events.send(WorkerEvent::RemoteDownload { url }).is_err() {
                        return false;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "control connection read failed");
                    return true;
                }
            }
        }
    }
}
