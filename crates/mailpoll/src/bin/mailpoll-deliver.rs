//! `mailpoll-deliver` - LMTP delivery agent run by getmail
//!
//! Reads one message from stdin and delivers it to the recipient given on the
//! command line. Diagnostics go to stderr; exit status 1 on failure.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use mailpoll::cli::DeliverCli;
use mailpoll::{app, logging};
use mailpoll_core::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DeliverCli::parse();
    logging::init_stderr();
    let settings = Settings::from_env();
    app::exit_code(app::deliver(&settings, &cli.recipient, tokio::io::stdin()).await)
}
