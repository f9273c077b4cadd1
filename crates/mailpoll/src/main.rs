//! `mailpoll` - getmail orchestrator
//!
//! Probes accounts (`--dry-run`) or runs fetch cycles forever. The hidden
//! `--deliver-lmtp` flag turns the process into the LMTP delivery agent.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use mailpoll::{Cli, app, logging};
use mailpoll_core::Settings;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(recipient) = cli.deliver_lmtp.as_deref() {
        logging::init_stderr();
        let settings = Settings::from_env();
        return app::exit_code(app::deliver(&settings, recipient, tokio::io::stdin()).await);
    }

    logging::init();
    info!("Starting mailpoll {}", env!("CARGO_PKG_VERSION"));
    let settings = cli.apply(Settings::from_env());
    app::log_banner(&settings);

    if cli.dry_run {
        app::probe_mode(&settings).await;
        ExitCode::SUCCESS
    } else {
        app::exit_code(app::daemon_mode(&settings).await)
    }
}
