//! Delivery sinks.
//!
//! getmail hands each fetched message to an external MDA. Two variants are
//! supported:
//!
//! - [`DeliverySink::Lmtp`]: the `mailpoll-deliver` agent, which reads the
//!   message from stdin and submits it over LMTP (see [`run_agent`]).
//! - [`DeliverySink::Relay`]: `msmtp`, configured once at startup to submit
//!   to an SMTP relay.

use std::io;
use std::path::PathBuf;

use mailpoll_lmtp::connection::connect;
use mailpoll_lmtp::{Address, Client, LmtpStream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info};

use crate::config::{DeliveryMode, Settings};
use crate::job::write_private;

/// Hostname announced in LHLO.
const LHLO_HOSTNAME: &str = "mailpoll.localhost";

/// Errors from the delivery agent or sink setup.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The message could not be read from the input.
    #[error("cannot read message: {0}")]
    Input(#[source] io::Error),

    /// Recipient or sender is not a usable envelope address.
    #[error("invalid envelope address {address:?}: {source}")]
    InvalidAddress {
        /// Rejected address.
        address: String,
        /// Validation error.
        #[source]
        source: mailpoll_lmtp::Error,
    },

    /// The LMTP session failed.
    #[error("LMTP delivery to {recipient} failed: {source}")]
    Lmtp {
        /// Envelope recipient.
        recipient: String,
        /// Underlying LMTP error.
        #[source]
        source: mailpoll_lmtp::Error,
    },

    /// The relay configuration could not be written.
    #[error("cannot write relay configuration {}: {source}", .path.display())]
    RelayConfig {
        /// Configuration path.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
}

/// What the delivery agent did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The LMTP server accepted the message.
    Delivered {
        /// Message size.
        bytes: usize,
    },
    /// Dry delivery: the message was read and discarded.
    DryRun {
        /// Message size.
        bytes: usize,
    },
}

impl DeliveryOutcome {
    /// Size of the handled message.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Delivered { bytes } | Self::DryRun { bytes } => bytes,
        }
    }
}

/// The MDA getmail runs for every fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliverySink {
    /// Local delivery agent speaking LMTP.
    Lmtp {
        /// Path of `mailpoll-deliver`.
        agent: PathBuf,
    },
    /// msmtp relay client.
    Relay {
        /// Path of `msmtp`.
        client: PathBuf,
        /// msmtp configuration file.
        config: PathBuf,
    },
}

impl DeliverySink {
    /// Selects the sink configured in `settings`.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.delivery_mode {
            DeliveryMode::Lmtp => Self::Lmtp {
                agent: settings.deliver_bin.clone(),
            },
            DeliveryMode::Relay => Self::Relay {
                client: settings.relay_bin.clone(),
                config: settings.relay_config.clone(),
            },
        }
    }

    /// MDA path and arguments for delivering to `target`.
    #[must_use]
    pub fn command(&self, target: &str) -> (PathBuf, Vec<String>) {
        match self {
            Self::Lmtp { agent } => (agent.clone(), vec![target.to_string()]),
            Self::Relay { client, config } => (
                client.clone(),
                vec![format!("--file={}", config.display()), target.to_string()],
            ),
        }
    }

    /// One-time setup at daemon start.
    ///
    /// For the relay variant this writes the msmtp configuration with
    /// owner-only permissions. The LMTP variant needs no setup.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::RelayConfig`] if the file cannot be written.
    pub async fn prepare(&self, settings: &Settings) -> Result<(), DeliveryError> {
        match self {
            Self::Lmtp { agent } => {
                debug!(agent = %agent.display(), "Using LMTP delivery agent");
                Ok(())
            }
            Self::Relay { config, .. } => {
                write_private(config, render_relay_config(settings).as_bytes())
                    .await
                    .map_err(|source| DeliveryError::RelayConfig {
                        path: config.clone(),
                        source,
                    })?;
                info!(
                    path = %config.display(),
                    host = %settings.relay_host,
                    port = settings.relay_port,
                    "Wrote relay configuration"
                );
                Ok(())
            }
        }
    }
}

/// msmtp configuration for an unauthenticated relay on the local network.
#[must_use]
pub fn render_relay_config(settings: &Settings) -> String {
    format!(
        "defaults\n\
         auth off\n\
         tls off\n\
         \n\
         account default\n\
         host {}\n\
         port {}\n\
         from {}\n",
        settings.relay_host, settings.relay_port, settings.sender_address
    )
}

/// Runs the local delivery agent: reads one message from `input` and
/// delivers it to `recipient`.
///
/// # Errors
///
/// Returns [`DeliveryError`] if reading or delivery fails.
pub async fn run_agent<R>(
    settings: &Settings,
    recipient: &str,
    mut input: R,
) -> Result<DeliveryOutcome, DeliveryError>
where
    R: AsyncRead + Unpin,
{
    let mut message = Vec::new();
    input
        .read_to_end(&mut message)
        .await
        .map_err(DeliveryError::Input)?;
    deliver_message(settings, recipient, &message).await
}

/// Delivers `message` to `recipient` over LMTP, or only logs it when dry
/// delivery is on.
///
/// # Errors
///
/// Returns [`DeliveryError`] if an address is invalid or the LMTP session
/// fails.
pub async fn deliver_message(
    settings: &Settings,
    recipient: &str,
    message: &[u8],
) -> Result<DeliveryOutcome, DeliveryError> {
    let bytes = message.len();

    if settings.dry_deliver {
        info!(
            "[DRY] Would deliver {bytes} bytes to {recipient} via LMTP ({}:{})",
            settings.lmtp_host, settings.lmtp_port
        );
        return Ok(DeliveryOutcome::DryRun { bytes });
    }

    let stream = connect(&settings.lmtp_host, settings.lmtp_port)
        .await
        .map_err(|source| DeliveryError::Lmtp {
            recipient: recipient.to_string(),
            source,
        })?;
    send_lmtp(stream, &settings.sender_address, recipient, message).await?;

    info!(recipient, bytes, "Delivered via LMTP");
    Ok(DeliveryOutcome::Delivered { bytes })
}

/// Runs one LMTP transaction on an open stream.
///
/// An empty `sender` uses the null reverse-path.
///
/// # Errors
///
/// Returns [`DeliveryError`] if an address is invalid or the server rejects
/// any step.
pub async fn send_lmtp<S>(
    stream: LmtpStream<S>,
    sender: &str,
    recipient: &str,
    message: &[u8],
) -> Result<(), DeliveryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let to = envelope_address(recipient)?;
    let from = if sender.is_empty() {
        None
    } else {
        Some(envelope_address(sender)?)
    };

    let session = async {
        let client = Client::from_stream(stream).await?;
        let client = client.lhlo(LHLO_HOSTNAME).await?;
        let client = client.mail_from(from).await?;
        let client = client.rcpt_to(to).await?;
        let client = client.data().await?;
        let (client, _reply) = client.send_message(message).await?;
        client.quit().await
    };

    session.await.map_err(|source| DeliveryError::Lmtp {
        recipient: recipient.to_string(),
        source,
    })
}

fn envelope_address(address: &str) -> Result<Address, DeliveryError> {
    Address::new(address).map_err(|source| DeliveryError::InvalidAddress {
        address: address.to_string(),
        source,
    })
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
    use std::sync::{Arc, Mutex};

    use super::*;
    use tokio_test::io::Builder;

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
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| (key == "HOME").then(|| "/home/getmail".to_string()))
        })
        .0
    }

    #[test]
    fn sink_commands() {
        let lmtp = DeliverySink::from_settings(&settings(&[("DELIVER_BIN", "/opt/mailpoll-deliver")]));
        assert_eq!(
            lmtp.command("alice@local"),
            (
                PathBuf::from("/opt/mailpoll-deliver"),
                vec!["alice@local".to_string()]
            )
        );

        let relay = DeliverySink::from_settings(&settings(&[("DELIVERY_MODE", "relay")]));
        assert_eq!(
            relay.command("bob@local"),
            (
                PathBuf::from("/usr/bin/msmtp"),
                vec![
                    "--file=/home/getmail/.msmtprc".to_string(),
                    "bob@local".to_string()
                ]
            )
        );
    }

    #[test]
    fn relay_config_contents() {
        let text = render_relay_config(&settings(&[("SMTP_RELAY_HOST", "relay.internal")]));
        assert_eq!(
            text,
            "defaults\nauth off\ntls off\n\naccount default\nhost relay.internal\nport 25\nfrom getmail-fetcher@localhost\n"
        );
    }

    #[tokio::test]
    async fn prepare_writes_private_relay_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msmtprc");
        let settings = settings(&[
            ("DELIVERY_MODE", "relay"),
            ("RELAY_CONFIG", path.to_str().unwrap()),
        ]);

        DeliverySink::from_settings(&settings).prepare(&settings).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("host postfix-mailcow"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn prepare_reports_unwritable_relay_config() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let settings = settings(&[
            ("DELIVERY_MODE", "relay"),
            ("RELAY_CONFIG", blocker.join("msmtprc").to_str().unwrap()),
        ]);

        let err = DeliverySink::from_settings(&settings)
            .prepare(&settings)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::RelayConfig { .. }));
    }

    #[tokio::test]
    async fn dry_delivery_reads_and_discards() {
        let settings = settings(&[("DRY_DELIVER", "yes"), ("LMTP_HOST", "unreachable.invalid")]);
        let message = [b'x'; 42];
        let (logs, _guard) = capture_logs();

        let outcome = run_agent(&settings, "bob@local", &message[..]).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::DryRun { bytes: 42 });
        assert_eq!(outcome.bytes(), 42);
        assert!(
            logs.text()
                .contains("[DRY] Would deliver 42 bytes to bob@local via LMTP (unreachable.invalid:24)"),
            "{}",
            logs.text()
        );
    }

    #[tokio::test]
    async fn lmtp_transaction() {
        let mock = Builder::new()
            .read(b"220 dovecot ready.\r\n")
            .write(b"LHLO mailpoll.localhost\r\n")
            .read(b"250-dovecot\r\n250 PIPELINING\r\n")
            .write(b"MAIL FROM:<getmail-fetcher@localhost>\r\n")
            .read(b"250 2.1.0 OK\r\n")
            .write(b"RCPT TO:<alice@local>\r\n")
            .read(b"250 2.1.5 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 OK\r\n")
            .write(b"Subject: hi\r\n\r\n..dot\r\n.\r\n")
            .read(b"250 2.0.0 <alice@local> Saved\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 2.0.0 Bye\r\n")
            .build();

        send_lmtp(
            LmtpStream::new(mock),
            "getmail-fetcher@localhost",
            "alice@local",
            b"Subject: hi\n\n.dot\n",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn rejected_recipient_names_recipient() {
        let mock = Builder::new()
            .read(b"220 dovecot ready.\r\n")
            .write(b"LHLO mailpoll.localhost\r\n")
            .read(b"250 dovecot\r\n")
            .write(b"MAIL FROM:<>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<ghost@local>\r\n")
            .read(b"550 5.1.1 User doesn't exist\r\n")
            .build();

        let err = send_lmtp(LmtpStream::new(mock), "", "ghost@local", b"x")
            .await
            .unwrap_err();
        assert!(matches!(&err, DeliveryError::Lmtp { recipient, .. } if recipient == "ghost@local"));
        assert!(err.to_string().contains("ghost@local"));
    }

    #[tokio::test]
    async fn invalid_recipient_fails_before_connecting() {
        let mock = Builder::new().build();
        let err = send_lmtp(LmtpStream::new(mock), "", "<bad>", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
    }
}
