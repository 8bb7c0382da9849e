pub mod app;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod logging;
pub mod player;
pub mod remote;

pub use downloader::DownloadError;
