//! clipfetch - paste a link, get the video

use clap::Parser;
use clipfetch::cli::{self, Cli};
use clipfetch::logging;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    // the error log lives where the settings say, so read them first
    let settings = cli::load_settings(&cli);
    let log_dir = settings.as_ref().ok().and_then(|s| s.log_dir.clone());
    let _guards = logging::init_tracing(log_dir.as_deref(), cli.verbose);

    cli::run_cli(cli, settings?).await
}
