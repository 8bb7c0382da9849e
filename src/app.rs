//! Front-end loop.
//!
//! Owns the receiving end of the worker result channel, the log queue consumer
//! and the player. Requests are submitted through the [`Sequencer`]; results are
//! picked up on a fixed tick so nothing here ever waits on a child process.

use eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::config::Settings;
use crate::downloader::errors::DownloadError;
use crate::downloader::orchestrator::{DownloadRequest, Request, Sequencer, WorkerEvent};
use crate::downloader::runner::CommandRunner;
use crate::downloader::ProbeInfo;
use crate::logging::{LogLevel, LogMode, LogQueue};
use crate::player::PlaybackEngine;
use crate::remote::RemoteClient;

/// Log pane refresh interval
pub const UI_TICK: Duration = Duration::from_millis(100);

/// What a finished request left behind
#[derive(Debug, Default)]
pub struct Finished {
    pub probe: Option<ProbeInfo>,
    pub output: Option<PathBuf>,
}

pub struct App {
    sequencer: Sequencer,
    events: UnboundedReceiver<WorkerEvent>,
    logs: LogQueue,
    log_mode: LogMode,
    player: Box<dyn PlaybackEngine>,
    settings: Settings,
}

impl App {
    pub fn new(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        player: Box<dyn PlaybackEngine>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let logs = LogQueue::new();
        let sequencer = Sequencer::new(runner, logs.clone(), tx)
            .with_probe_timeout(settings.probe_timeout());

        Self {
            sequencer,
            events: rx,
            log_mode: settings.log_mode,
            logs,
            player,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn player(&self) -> &dyn PlaybackEngine {
        self.player.as_ref()
    }

    /// Submit `request` and pump events until its task has finished.
    pub async fn perform(&mut self, request: Request) -> Result<Finished> {
        let mut handle = self.sequencer.submit(request)?;
        let mut tick = tokio::time::interval(UI_TICK);
        let mut finished = Finished::default();
        let mut failure = None;

        loop {
            tokio::select! {
                joined = &mut handle => {
                    joined?;
                    break;
                }
                Some(event) = self.events.recv() => {
                    self.handle_event(event, &mut finished, &mut failure);
                }
                _ = tick.tick() => self.flush_logs(),
            }
        }

        // events sent just before the task ended
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event, &mut finished, &mut failure);
        }
        self.flush_logs();

        match failure {
            Some(error) => Err(eyre::Report::new(error)),
            None => Ok(finished),
        }
    }

    /// Listen on the remote control channel until Ctrl-C, downloading whatever arrives.
    pub async fn serve_remote(&mut self, addr: String) -> Result<()> {
        let client = RemoteClient::new(addr, self.sequencer.event_sender(), self.logs.clone())
            .spawn();
        let mut tick = tokio::time::interval(UI_TICK);
        let mut finished = Finished::default();
        let mut failure = None;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                Some(event) = self.events.recv() => {
                    self.handle_event(event, &mut finished, &mut failure);
                    // a failed remote download does not end the session
                    failure = None;
                }
                _ = tick.tick() => self.flush_logs(),
            }
        }

        client.abort();
        self.flush_logs();
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: WorkerEvent,
        finished: &mut Finished,
        failure: &mut Option<DownloadError>,
    ) {
        match event {
            WorkerEvent::QualitiesReady(info) => {
                finished.probe = Some(info);
            }
            WorkerEvent::Completed { control, output } => {
                tracing::info!(%control, output = %output.display(), "completed");
                finished.output = Some(output);
            }
            WorkerEvent::Failed { control, error } => {
                tracing::debug!(%control, %error, "request failed");
                *failure = Some(error);
            }
            WorkerEvent::LoadIntoPlayer { path } => {
                match self.player.load(&path) {
                    Ok(()) => self.logs.info(format!("playing {}", path.display())),
                    Err(e) => self.logs.error(format!("could not load into player: {}", e)),
                }
            }
            WorkerEvent::RemoteDownload { url } => {
                let mut req = DownloadRequest::new(url, &self.settings.download_dir);
                req.embed_metadata = self.settings.embed_metadata;
                req.embed_thumbnail = self.settings.embed_thumbnail;
                if let Err(e) = self.sequencer.submit(Request::Download(req)) {
                    self.logs.error(format!("remote download refused: {}", e));
                }
            }
        }
    }

    fn flush_logs(&self) {
        for entry in self.logs.drain(self.log_mode) {
            match entry.level {
                LogLevel::Info => eprintln!("{}", entry.message),
                LogLevel::Debug => eprintln!("  {}", entry.message),
                LogLevel::Error => eprintln!("error: {}", entry.message),
            }
        }
    }
}
