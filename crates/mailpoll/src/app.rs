//! Run modes: probe, daemon and delivery agent.

use std::process::ExitCode;

use anyhow::Context;
use mailpoll_core::probe::probe_all;
use mailpoll_core::{
    Account, DeliveryOutcome, FetchRunner, GetmailLauncher, ProbeError, ProbeReport, Scheduler,
    Settings, load_accounts, start_up,
};
use tokio::io::AsyncRead;
use tracing::{error, info, warn};

/// Logs the configuration banner, plus a warning when dry delivery is on.
pub fn log_banner(settings: &Settings) {
    for line in settings.to_string().lines() {
        info!("{line}");
    }
    if settings.dry_deliver {
        warn!(
            state_dir = %settings.dry_state_dir.display(),
            "DRY_DELIVER is on: messages are fetched but not delivered"
        );
    }
}

/// Probes every account once and prints one line per account.
///
/// Individual failures are reported in the output, never as an error.
pub async fn probe_mode(settings: &Settings) {
    for line in probe_lines(settings).await {
        println!("{line}");
    }
}

/// Probe output, one line per account in file order.
pub async fn probe_lines(settings: &Settings) -> Vec<String> {
    let accounts = load_accounts(&settings.accounts_file);
    if accounts.is_empty() {
        warn!(path = %settings.accounts_file.display(), "No accounts to check");
    }
    probe_all(&accounts)
        .await
        .into_iter()
        .map(|(account, result)| probe_line(account, &result))
        .collect()
}

/// Formats one probe result.
#[must_use]
pub fn probe_line(account: &Account, result: &Result<ProbeReport, ProbeError>) -> String {
    let protocol = account.protocol().label();
    match result {
        Ok(report) => format!("[{account}] {protocol}: {report}"),
        Err(e) => format!("[{account}] {protocol}: FAILED: {e}"),
    }
}

/// Prepares the delivery sink and runs fetch cycles forever.
///
/// # Errors
///
/// Returns an error if the delivery sink or the webhook client cannot be set
/// up. Failures inside a cycle are logged and never returned.
pub async fn daemon_mode(settings: &Settings) -> anyhow::Result<()> {
    let (sink, notifier) = start_up(settings)
        .await
        .context("daemon start-up failed")?;

    let runner = FetchRunner::new(settings, &sink, GetmailLauncher);
    let scheduler = Scheduler::new(
        &settings.accounts_file,
        settings.fetch_interval,
        runner,
        notifier,
    );

    info!("Starting fetch loop");
    scheduler.run_forever().await;
    Ok(())
}

/// Runs the LMTP delivery agent on `input`.
///
/// # Errors
///
/// Returns an error if the message cannot be read or delivered.
pub async fn deliver<R>(
    settings: &Settings,
    recipient: &str,
    input: R,
) -> anyhow::Result<DeliveryOutcome>
where
    R: AsyncRead + Unpin,
{
    mailpoll_core::delivery::run_agent(settings, recipient, input)
        .await
        .with_context(|| format!("delivery to {recipient} failed"))
}

/// Maps a run result to the process exit code, logging any error.
pub fn exit_code<T>(result: anyhow::Result<T>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
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
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (capture, tracing::subscriber::set_default(subscriber))
    }

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned()).0
    }

    #[test]
    fn probe_line_formats() {
        let account = Account::new("alice", "secret", "imap.example.com", "alice@local");
        let ok = Ok(ProbeReport {
            protocol: account.protocol(),
            messages: Some(3),
            size: None,
        });
        assert_eq!(
            probe_line(&account, &ok),
            "[alice@imap.example.com] IMAP_SSL: Found 3 messages in INBOX."
        );

        let err = Err(ProbeError::Auth("Authentication failed.".into()));
        let line = probe_line(&account, &err);
        assert!(line.starts_with("[alice@imap.example.com] IMAP_SSL: FAILED:"));
        assert!(!line.contains("secret"));
    }

    #[tokio::test]
    async fn probe_lines_cover_every_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.list");
        std::fs::write(
            &path,
            "# two unreachable accounts\n\
             alice:\"pw\":bad host:alice@local\n\
             broken line\n\
             bob:\"pw\":bad pop host:bob@local\n",
        )
        .unwrap();
        let settings = settings(&[("ACCOUNTS_FILE", path.to_str().unwrap())]);

        let lines = probe_lines(&settings).await;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[alice@bad host] IMAP_SSL: FAILED:"));
        assert!(lines[1].starts_with("[bob@bad pop host] POP3_SSL: FAILED:"));
    }

    #[tokio::test]
    async fn dry_delivery_reads_input_and_touches_no_network() {
        let settings = settings(&[("DRY_DELIVER", "true"), ("LMTP_HOST", "invalid.invalid")]);
        let message = [b'x'; 42];
        let (logs, _guard) = capture_logs();

        let outcome = deliver(&settings, "bob@local", &message[..]).await.unwrap();
        let text = logs.text();
        assert!(
            text.contains("[DRY] Would deliver 42 bytes to bob@local via LMTP"),
            "{text}"
        );
        assert_eq!(outcome, DeliveryOutcome::DryRun { bytes: 42 });
        assert_eq!(exit_code(Ok(outcome)), ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn refused_lmtp_connection_fails_delivery() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        drop(listener);
        let settings = settings(&[("LMTP_HOST", "127.0.0.1"), ("LMTP_PORT", &port)]);

        let result = deliver(&settings, "bob@local", &b"Subject: x\r\n\r\nbody\r\n"[..]).await;
        assert!(result.is_err());
        assert_eq!(exit_code(result), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn daemon_stops_when_relay_config_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let config = blocker.join("msmtprc");
        let settings = settings(&[
            ("DELIVERY_MODE", "relay"),
            ("RELAY_CONFIG", config.to_str().unwrap()),
        ]);

        let err = daemon_mode(&settings).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("daemon start-up failed"));
        assert!(message.contains("cannot write relay configuration"));
    }
}
