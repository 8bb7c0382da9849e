// Downloader module - URL handling, command construction and process orchestration

pub mod commands;
pub mod encode;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod runner;
pub mod thumbnail;
pub mod tools;
pub mod url;

pub use commands::CommandVector;
pub use errors::DownloadError;
pub use models::{DownloadSpec, OutputFormat, ProbeInfo, ProcessResult, Quality, Timestamp};
pub use orchestrator::{Control, DownloadRequest, Request, Sequencer, WorkerEvent};
pub use platform::Platform;
pub use runner::{CommandRunner, ProcessRunner};
pub use tools::ToolManager;
