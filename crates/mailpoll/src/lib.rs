//! `mailpoll` - getmail orchestrator
//!
//! Shared pieces of the `mailpoll` and `mailpoll-deliver` binaries: command
//! line parsing, logging setup and the three run modes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod logging;

pub use cli::Cli;
