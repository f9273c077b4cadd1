//! # mailpoll-core
//!
//! Core logic for `mailpoll`, a polling mail fetcher built around getmail.
//!
//! This crate provides:
//! - Account list parsing and protocol selection
//! - Settings built once from the environment
//! - getmail rc file generation per account
//! - The fetch runner that drives getmail
//! - Delivery sinks (LMTP delivery agent or msmtp relay)
//! - The completion webhook
//! - A read-only diagnostic prober (IMAP / POP3)
//! - The fixed-interval cycle scheduler

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
pub mod delivery;
mod error;
pub mod fetch;
pub mod job;
pub mod notify;
pub mod probe;
pub mod scheduler;

pub use account::{Account, ParseError, Protocol, load_accounts, parse_accounts, parse_line};
pub use config::{ConfigWarning, DeliveryMode, Settings};
pub use delivery::{DeliveryError, DeliveryOutcome, DeliverySink, deliver_message};
pub use error::{Error, Result};
pub use fetch::{FetchError, FetchRunner, GetmailLauncher, JobLauncher};
pub use job::{JobConfig, JobParseError, config_name, generate, sanitize};
pub use notify::{NotifyError, Notifier};
pub use probe::{ProbeError, ProbeReport, probe, probe_all};
pub use scheduler::{
    AccountOutcome, CompletionHook, CycleReport, Fetcher, Scheduler, Sleeper, TokioSleeper,
    start_up,
};
