//! Fixed-interval cycle scheduler.
//!
//! One cycle reloads the account list, fetches every account in file order,
//! then fires the completion hook once. A failing account never stops the
//! others, and the hook fires whatever the outcomes were.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::account::{Account, load_accounts};
use crate::config::Settings;
use crate::delivery::DeliverySink;
use crate::fetch::{FetchError, FetchRunner, JobLauncher};
use crate::notify::Notifier;

/// Daemon start-up: selects and prepares the delivery sink, then builds the
/// completion notifier.
///
/// # Errors
///
/// Returns [`crate::Error::Delivery`] if the relay configuration cannot be
/// written, or [`crate::Error::Notify`] if the HTTP client cannot be built.
pub async fn start_up(settings: &Settings) -> crate::Result<(DeliverySink, Notifier)> {
    let sink = DeliverySink::from_settings(settings);
    sink.prepare(settings).await?;
    let notifier = Notifier::new(settings.success_hook_url.clone())?;
    Ok((sink, notifier))
}

/// Fetches one account.
pub trait Fetcher {
    /// Runs one fetch for `account`.
    fn fetch(&self, account: &Account) -> impl Future<Output = Result<(), FetchError>>;
}

impl<L: JobLauncher> Fetcher for FetchRunner<'_, L> {
    async fn fetch(&self, account: &Account) -> Result<(), FetchError> {
        self.run(account).await
    }
}

/// Called once after every account of a cycle was attempted.
pub trait CompletionHook {
    /// Runs the hook; returns whether anything was fired.
    fn complete(&self) -> impl Future<Output = bool>;
}

impl CompletionHook for Notifier {
    async fn complete(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.notify().await;
        true
    }
}

/// Waits between cycles.
pub trait Sleeper {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of fetching a single account.
#[derive(Debug)]
pub struct AccountOutcome {
    /// Account label (`user@server`).
    pub account: String,
    /// Fetch result.
    pub result: Result<(), FetchError>,
}

/// Everything one cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// One entry per attempted account, in file order.
    pub outcomes: Vec<AccountOutcome>,
    /// Whether the completion hook fired.
    pub notified: bool,
}

impl CycleReport {
    /// Number of accounts that failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Drives fetch cycles.
#[derive(Debug)]
pub struct Scheduler<F, H, Z = TokioSleeper> {
    accounts_file: PathBuf,
    interval: Duration,
    fetcher: F,
    hook: H,
    sleeper: Z,
}

impl<F, H> Scheduler<F, H>
where
    F: Fetcher,
    H: CompletionHook,
{
    /// Creates a scheduler sleeping on the tokio timer.
    pub fn new(accounts_file: impl Into<PathBuf>, interval: Duration, fetcher: F, hook: H) -> Self {
        Self::with_sleeper(accounts_file, interval, fetcher, hook, TokioSleeper)
    }
}

impl<F, H, Z> Scheduler<F, H, Z>
where
    F: Fetcher,
    H: CompletionHook,
    Z: Sleeper,
{
    /// Creates a scheduler with a custom sleeper.
    pub fn with_sleeper(
        accounts_file: impl Into<PathBuf>,
        interval: Duration,
        fetcher: F,
        hook: H,
        sleeper: Z,
    ) -> Self {
        Self {
            accounts_file: accounts_file.into(),
            interval,
            fetcher,
            hook,
            sleeper,
        }
    }

    /// Runs a single cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let accounts = load_accounts(&self.accounts_file);
        info!(count = accounts.len(), "Starting fetch cycle");

        let mut outcomes = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let result = self.fetcher.fetch(account).await;
            outcomes.push(AccountOutcome {
                account: account.to_string(),
                result,
            });
        }

        let notified = self.hook.complete().await;
        let report = CycleReport { outcomes, notified };

        let failures = report.failures();
        if failures > 0 {
            warn!(failures, total = report.outcomes.len(), "Cycle finished with failures");
        }
        info!(
            seconds = self.interval.as_secs(),
            "Cycle complete, sleeping"
        );
        report
    }

    /// Runs cycles while `keep_going` approves the last report, sleeping the
    /// interval between them. Returns the last report.
    pub async fn run_until<P>(&self, mut keep_going: P) -> CycleReport
    where
        P: FnMut(&CycleReport) -> bool,
    {
        loop {
            let report = self.run_cycle().await;
            if !keep_going(&report) {
                return report;
            }
            self.sleeper.sleep(self.interval).await;
        }
    }

    /// Runs cycles until the process is stopped.
    pub async fn run_forever(&self) {
        loop {
            self.run_cycle().await;
            self.sleeper.sleep(self.interval).await;
        }
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
    use std::cell::{Cell, RefCell};
    use std::io::Write;

    use super::*;

    /// Fails for one user, succeeds for everyone else.
    #[derive(Default)]
    struct ScriptedFetcher {
        failing_user: &'static str,
        seen: RefCell<Vec<String>>,
    }

    impl Fetcher for &ScriptedFetcher {
        async fn fetch(&self, account: &Account) -> Result<(), FetchError> {
            self.seen.borrow_mut().push(account.to_string());
            if account.user == self.failing_user {
                Err(FetchError::Exit { code: Some(1) })
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        calls: Cell<usize>,
    }

    impl CompletionHook for &RecordingHook {
        async fn complete(&self) -> bool {
            self.calls.set(self.calls.get() + 1);
            true
        }
    }

    #[derive(Default)]
    struct NoSleep {
        slept: RefCell<Vec<Duration>>,
    }

    impl Sleeper for &NoSleep {
        async fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    fn accounts_file(lines: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(lines.as_bytes()).unwrap();
        file
    }

    const THREE: &str = concat!(
        "alice:\"p1\":imap.example.com:alice@local\n",
        "bob:\"p2\":pop.example.com:bob@local\n",
        "carol:\"p3\":mail.example.com:carol@local\n",
    );

    #[tokio::test]
    async fn failing_account_does_not_stop_the_cycle() {
        let file = accounts_file(THREE);
        let fetcher = ScriptedFetcher {
            failing_user: "bob",
            ..Default::default()
        };
        let hook = RecordingHook::default();
        let sleeper = NoSleep::default();
        let scheduler =
            Scheduler::with_sleeper(file.path(), Duration::from_secs(300), &fetcher, &hook, &sleeper);

        let report = scheduler.run_cycle().await;

        assert_eq!(
            *fetcher.seen.borrow(),
            vec![
                "alice@imap.example.com",
                "bob@pop.example.com",
                "carol@mail.example.com"
            ]
        );
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].result.is_ok());
        assert!(matches!(
            report.outcomes[1].result,
            Err(FetchError::Exit { code: Some(1) })
        ));
        assert!(report.outcomes[2].result.is_ok());
        assert_eq!(report.failures(), 1);
        assert!(report.notified);
        assert_eq!(hook.calls.get(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_cycle_that_still_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::default();
        let hook = RecordingHook::default();
        let sleeper = NoSleep::default();
        let scheduler = Scheduler::with_sleeper(
            dir.path().join("absent.list"),
            Duration::from_secs(1),
            &fetcher,
            &hook,
            &sleeper,
        );

        let report = scheduler.run_cycle().await;
        assert!(report.outcomes.is_empty());
        assert_eq!(hook.calls.get(), 1);
    }

    #[tokio::test]
    async fn run_until_sleeps_between_cycles_only() {
        let file = accounts_file("alice:\"p\":imap.example.com:alice@local\n");
        let fetcher = ScriptedFetcher::default();
        let hook = RecordingHook::default();
        let sleeper = NoSleep::default();
        let scheduler =
            Scheduler::with_sleeper(file.path(), Duration::from_secs(60), &fetcher, &hook, &sleeper);

        let mut cycles = 0;
        scheduler
            .run_until(|_| {
                cycles += 1;
                cycles < 3
            })
            .await;

        assert_eq!(cycles, 3);
        assert_eq!(hook.calls.get(), 3);
        assert_eq!(fetcher.seen.borrow().len(), 3);
        assert_eq!(*sleeper.slept.borrow(), vec![Duration::from_secs(60); 2]);
    }

    #[tokio::test]
    async fn accounts_are_reloaded_every_cycle() {
        let file = accounts_file("alice:\"p\":imap.example.com:alice@local\n");
        let path = file.path().to_path_buf();
        let fetcher = ScriptedFetcher::default();
        let hook = RecordingHook::default();
        let sleeper = NoSleep::default();
        let scheduler =
            Scheduler::with_sleeper(&path, Duration::from_secs(1), &fetcher, &hook, &sleeper);

        let mut cycles = 0;
        let last = scheduler
            .run_until(|_| {
                cycles += 1;
                std::fs::write(&path, THREE).unwrap();
                cycles < 2
            })
            .await;

        assert_eq!(last.outcomes.len(), 3);
        assert_eq!(fetcher.seen.borrow().len(), 4);
    }

    #[tokio::test]
    async fn start_up_writes_relay_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("msmtp").join("config");
        let config_str = config.display().to_string();
        let (settings, _) = Settings::from_lookup(|key| match key {
            "DELIVERY_MODE" => Some("relay".to_string()),
            "RELAY_CONFIG" => Some(config_str.clone()),
            _ => None,
        });

        let (sink, notifier) = start_up(&settings).await.unwrap();
        assert!(matches!(sink, DeliverySink::Relay { .. }));
        assert!(!notifier.is_enabled());
        assert!(config.is_file());
    }

    #[tokio::test]
    async fn start_up_fails_on_unwritable_relay_config() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let config_str = blocker.join("config").display().to_string();
        let (settings, _) = Settings::from_lookup(|key| match key {
            "DELIVERY_MODE" => Some("relay".to_string()),
            "RELAY_CONFIG" => Some(config_str.clone()),
            _ => None,
        });

        assert!(matches!(
            start_up(&settings).await,
            Err(crate::Error::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn disabled_notifier_reports_not_fired() {
        let notifier = Notifier::new(None).unwrap();
        assert!(!notifier.complete().await);
    }
}
