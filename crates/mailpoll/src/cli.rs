//! Command line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mailpoll_core::Settings;

/// Polls remote mailboxes with getmail and delivers them locally.
#[derive(Debug, Parser)]
#[command(name = "mailpoll", version, about)]
pub struct Cli {
    /// Check every account read-only (IMAP EXAMINE / POP3 STAT) and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Account list; overrides ACCOUNTS_FILE.
    #[arg(long, value_name = "PATH")]
    pub accounts: Option<PathBuf>,

    /// Seconds between fetch cycles; overrides FETCH_INTERVAL.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Act as the LMTP delivery agent for RECIPIENT, reading the message
    /// from stdin.
    #[arg(long, value_name = "RECIPIENT", hide = true, conflicts_with = "dry_run")]
    pub deliver_lmtp: Option<String>,
}

/// Delivers one message from stdin to a local mailbox over LMTP.
#[derive(Debug, Parser)]
#[command(name = "mailpoll-deliver", version)]
pub struct DeliverCli {
    /// Envelope recipient.
    pub recipient: String,
}

impl Cli {
    /// Applies command line overrides on top of the environment settings.
    #[must_use]
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(path) = &self.accounts {
            settings = settings.with_accounts_file(path);
        }
        if let Some(secs) = self.interval {
            settings = settings.with_fetch_interval(Duration::from_secs(secs));
        }
        settings
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::from_lookup(|key| (key == "HOME").then(|| "/home/fetch".to_string())).0
    }

    #[test]
    fn daemon_mode_by_default() {
        let cli = Cli::try_parse_from(["mailpoll"]).unwrap();
        assert!(!cli.dry_run);
        assert!(cli.deliver_lmtp.is_none());
        assert_eq!(cli.apply(settings()), settings());
    }

    #[test]
    fn overrides_replace_environment_values() {
        let cli = Cli::try_parse_from([
            "mailpoll",
            "--dry-run",
            "--accounts",
            "/etc/mailpoll/accounts.list",
            "--interval",
            "60",
        ])
        .unwrap();
        assert!(cli.dry_run);

        let settings = cli.apply(settings());
        assert_eq!(
            settings.accounts_file,
            PathBuf::from("/etc/mailpoll/accounts.list")
        );
        assert_eq!(settings.fetch_interval, Duration::from_secs(60));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Cli::try_parse_from(["mailpoll", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["mailpoll", "--interval", "soon"]).is_err());
    }

    #[test]
    fn hidden_agent_flag() {
        let cli = Cli::try_parse_from(["mailpoll", "--deliver-lmtp", "bob@local"]).unwrap();
        assert_eq!(cli.deliver_lmtp.as_deref(), Some("bob@local"));
        assert!(
            Cli::try_parse_from(["mailpoll", "--deliver-lmtp", "bob@local", "--dry-run"]).is_err()
        );
    }

    #[test]
    fn agent_requires_a_recipient() {
        assert!(DeliverCli::try_parse_from(["mailpoll-deliver"]).is_err());
        let cli = DeliverCli::try_parse_from(["mailpoll-deliver", "alice@local"]).unwrap();
        assert_eq!(cli.recipient, "alice@local");
    }

    #[test]
    fn clap_definitions_are_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
        DeliverCli::command().debug_assert();
    }
}
