//! Logging: the user-facing log pane queue and the `tracing` setup.
//!
//! Workers push [`LogEntry`] values into a shared [`LogQueue`]; the front end
//! drains it on a timer. Every entry is mirrored to `tracing`, and error
//! entries additionally land in the append-only `error.log`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const ERROR_LOG_FILE: &str = "error.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Info and error entries only
    #[default]
    Concise,
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn visible_in(&self, mode: LogMode) -> bool {
        match mode {
            LogMode::Verbose => true,
            LogMode::Concise => self.level != LogLevel::Debug,
        }
    }
}

/// FIFO shared between worker tasks (producers) and the front end (single consumer)
#[derive(Debug, Clone, Default)]
pub struct LogQueue {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // a panicking producer cannot leave a half-written entry behind
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => tracing::error!(target: "clipfetch::log", "{}", message),
            _ => tracing::debug!(target: "clipfetch::log", level = ?level, "{}", message),
        }
        self.lock().push_back(LogEntry { level, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.push(LogLevel::Debug, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Remove everything queued so far and return what `mode` shows, oldest first.
    pub fn drain(&self, mode: LogMode) -> Vec<LogEntry> {
        let drained: Vec<LogEntry> = self.lock().drain(..).collect();
        drained.into_iter().filter(|e| e.visible_in(mode)).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Keeps the non-blocking writers flushing; hold for the life of the process.
pub struct LogGuards {
    _stderr: WorkerGuard,
    _error_log: Option<WorkerGuard>,
}

pub fn error_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(ERROR_LOG_FILE)
}

/// Install the global subscriber: stderr filtered by `RUST_LOG` (default
/// `clipfetch=info`, or `clipfetch=debug` when verbose) plus an ERROR-only
/// `error.log` inside `log_dir`.
///
/// Log pane entries are printed by the front end, so their `tracing` mirror
/// is kept off stderr by default. It still reaches `error.log`.
pub fn init_tracing(log_dir: Option<&Path>, verbose: bool) -> LogGuards {
    let default_directive = if verbose {
        "clipfetch=debug,clipfetch::log=off"
    } else {
        "clipfetch=info,clipfetch::log=off"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = fmt::layer()
        .with_writer(stderr_writer)
        .with_target(false)
        .with_filter(env_filter);

    let appender = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(ERROR_LOG_FILE)
            .build(dir)
            .ok()
    });

    let (error_layer, error_guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(error_layer)
        .try_init();

    LogGuards {
        _stderr: stderr_guard,
        _error_log: error_guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order() {
        let queue = LogQueue::new();
        queue.info("first");
        queue.debug("second");
        queue.error("third");

        let entries = queue.drain(LogMode::Verbose);
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn concise_mode_hides_debug() {
        let queue = LogQueue::new();
        queue.info("shown");
        queue.debug("hidden");
        queue.error("also shown");

        let entries = queue.drain(LogMode::Concise);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.level != LogLevel::Debug));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn concurrent_producers_do_not_lose_entries() {
        let queue = LogQueue::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let q = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        q.info(format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let entries = queue.drain(LogMode::Verbose);
        assert_eq!(entries.len(), 800);
        // per-producer order survives
        let from_first: Vec<_> = entries
            .iter()
            .filter(|e| e.message.starts_with("0-"))
            .map(|e| e.message.clone())
            .collect();
        let expected: Vec<_> = (0..100).map(|i| format!("0-{}", i)).collect();
        assert_eq!(from_first, expected);
    }

    #[test]
    fn log_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogMode::Verbose).unwrap(), "\"verbose\"");
        let mode: LogMode = serde_json::from_str("\"concise\"").unwrap();
        assert_eq!(mode, LogMode::Concise);
    }
}
