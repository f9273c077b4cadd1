//! Read-only diagnostic prober.
//!
//! Logs in to an account's mailbox and reports how many messages are
//! waiting, without fetching or changing anything: IMAP opens `INBOX` with
//! EXAMINE and POP3 only issues STAT.

use std::fmt;
use std::time::Duration;

use mailpoll_imap::connection::connect_tls as imap_connect;
use mailpoll_pop3::connection::connect_tls as pop3_connect;
use mailpoll_pop3::Pop3Stream;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::account::{Account, Protocol};

/// Mailbox opened by the IMAP probe.
const PROBE_MAILBOX: &str = "INBOX";

/// What a probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// Protocol used.
    pub protocol: Protocol,
    /// Number of messages; `None` when the IMAP search was refused.
    pub messages: Option<usize>,
    /// Total size in octets (POP3 only).
    pub size: Option<u64>,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.messages, self.size) {
            (Some(count), Some(size)) => {
                write!(f, "Found {count} messages (Total size: {size} bytes).")
            }
            (Some(count), None) => write!(f, "Found {count} messages in {PROBE_MAILBOX}."),
            (None, _) => write!(f, "Failed to search {PROBE_MAILBOX}."),
        }
    }
}

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// TCP, TLS or name resolution failure, or the server hung up.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The server answered something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Connection setup took too long.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl From<mailpoll_imap::Error> for ProbeError {
    fn from(err: mailpoll_imap::Error) -> Self {
        use mailpoll_imap::Error as E;
        match err {
            E::Io(_) | E::Tls(_) | E::InvalidDnsName(_) => Self::Connect(err.to_string()),
            E::Auth(text) => Self::Auth(text),
            E::Timeout(after) => Self::Timeout(after),
            E::Parse { .. } | E::No(_) | E::Bad(_) | E::Bye(_) | E::Protocol(_) => {
                Self::Protocol(err.to_string())
            }
        }
    }
}

impl From<mailpoll_pop3::Error> for ProbeError {
    fn from(err: mailpoll_pop3::Error) -> Self {
        use mailpoll_pop3::Error as E;
        match err {
            E::Io(_) | E::Tls(_) | E::InvalidDnsName(_) | E::ConnectionClosed => {
                Self::Connect(err.to_string())
            }
            E::Auth(text) => Self::Auth(text),
            E::Timeout(after) => Self::Timeout(after),
            E::Err(_) | E::Protocol(_) | E::InvalidArgument(_) => Self::Protocol(err.to_string()),
        }
    }
}

/// Probes one account over its inferred protocol.
///
/// # Errors
///
/// Returns [`ProbeError`] on connection, authentication or protocol failure.
pub async fn probe(account: &Account) -> Result<ProbeReport, ProbeError> {
    let protocol = account.protocol();
    info!(account = %account, protocol = %protocol, "Checking mailbox");

    match protocol {
        Protocol::ImapSsl => {
            let config = mailpoll_imap::Config::new(account.server.as_str());
            let stream = imap_connect(&config).await?;
            probe_imap(stream, account).await
        }
        Protocol::Pop3Ssl => {
            let config = mailpoll_pop3::Config::new(account.server.as_str());
            let stream = pop3_connect(&config).await?;
            probe_pop3(stream, account).await
        }
    }
}

/// Runs the IMAP probe on a connected stream.
///
/// # Errors
///
/// Returns [`ProbeError`] if login or EXAMINE fails. A refused SEARCH is
/// reported as a count of `None` instead.
pub async fn probe_imap<S>(stream: S, account: &Account) -> Result<ProbeReport, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client = mailpoll_imap::Client::from_stream(stream).await?;
    let client = client.login(&account.user, &account.password).await?;
    let (mut client, status) = client.examine(PROBE_MAILBOX).await?;
    debug!(account = %account, exists = status.exists, read_only = status.read_only, "Mailbox opened");

    let messages = match client.search("ALL").await {
        Ok(ids) => Some(ids.len()),
        Err(e) if e.is_refusal() => {
            warn!(account = %account, error = %e, "Search refused");
            None
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = client.logout().await {
        debug!(account = %account, error = %e, "Logout failed");
    }

    Ok(ProbeReport {
        protocol: Protocol::ImapSsl,
        messages,
        size: None,
    })
}

/// Runs the POP3 probe on a connected stream.
///
/// QUIT is sent even when STAT fails.
///
/// # Errors
///
/// Returns [`ProbeError`] if login or STAT fails.
pub async fn probe_pop3<S>(
    stream: Pop3Stream<S>,
    account: &Account,
) -> Result<ProbeReport, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client = mailpoll_pop3::Client::from_stream(stream).await?;
    let mut client = client.login(&account.user, &account.password).await?;
    let stat = client.stat().await;

    if let Err(e) = client.quit().await {
        debug!(account = %account, error = %e, "QUIT failed");
    }

    let stat = stat?;
    Ok(ProbeReport {
        protocol: Protocol::Pop3Ssl,
        messages: usize::try_from(stat.count).ok(),
        size: Some(stat.size),
    })
}

/// Probes every account in order. A failure never stops the rest.
pub async fn probe_all(accounts: &[Account]) -> Vec<(&Account, Result<ProbeReport, ProbeError>)> {
    let mut results = Vec::with_capacity(accounts.len());
    for account in accounts {
        let result = probe(account).await;
        match &result {
            Ok(report) => info!(account = %account, "{report}"),
            Err(e) => warn!(account = %account, error = %e, "Probe failed"),
        }
        results.push((account, result));
    }
    results
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
    use tokio_test::io::Builder;

    fn imap_account() -> Account {
        Account::new("alice", "secret", "imap.example.com", "alice@local")
    }

    fn pop_account() -> Account {
        Account::new("bob", "secret", "pop.example.com", "bob@local")
    }

    #[tokio::test]
    async fn imap_probe_counts_messages_read_only() {
        let mock = Builder::new()
            .read(b"* OK Dovecot ready.\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .read(b"A0000 OK Logged in\r\n")
            .write(b"A0001 EXAMINE INBOX\r\n")
            .read(b"* 4 EXISTS\r\nA0001 OK [READ-ONLY] Examine completed\r\n")
            .write(b"A0002 SEARCH ALL\r\n")
            .read(b"* SEARCH 1 2 3 4\r\nA0002 OK Search completed\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE Logging out\r\nA0003 OK Logout completed\r\n")
            .build();

        let report = probe_imap(mock, &imap_account()).await.unwrap();
        assert_eq!(
            report,
            ProbeReport {
                protocol: Protocol::ImapSsl,
                messages: Some(4),
                size: None
            }
        );
        assert_eq!(report.to_string(), "Found 4 messages in INBOX.");
    }

    #[tokio::test]
    async fn refused_search_reports_no_count() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .read(b"A0000 OK Logged in\r\n")
            .write(b"A0001 EXAMINE INBOX\r\n")
            .read(b"A0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 SEARCH ALL\r\n")
            .read(b"A0002 NO Search failed\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"A0003 OK bye\r\n")
            .build();

        let report = probe_imap(mock, &imap_account()).await.unwrap();
        assert_eq!(report.messages, None);
        assert_eq!(report.to_string(), "Failed to search INBOX.");
    }

    #[tokio::test]
    async fn imap_auth_failure() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .read(b"A0000 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n")
            .build();

        let err = probe_imap(mock, &imap_account()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Auth(_)));
    }

    #[tokio::test]
    async fn pop3_probe_reports_count_and_size() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER bob\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK Logged in.\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK 2 320\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();

        let report = probe_pop3(Pop3Stream::new(mock), &pop_account()).await.unwrap();
        assert_eq!(report.messages, Some(2));
        assert_eq!(report.size, Some(320));
        assert_eq!(report.to_string(), "Found 2 messages (Total size: 320 bytes).");
    }

    #[tokio::test]
    async fn pop3_quits_even_when_stat_fails() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER bob\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK\r\n")
            .write(b"STAT\r\n")
            .read(b"-ERR maildrop busy\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();

        let err = probe_pop3(Pop3Stream::new(mock), &pop_account()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Protocol(_)));
    }

    #[tokio::test]
    async fn invalid_host_is_connect_error_for_both_protocols() {
        let imap = Account::new("a", "b", "bad host", "t");
        assert!(matches!(probe(&imap).await, Err(ProbeError::Connect(_))));

        let pop = Account::new("a", "b", "bad pop host", "t");
        assert!(matches!(probe(&pop).await, Err(ProbeError::Connect(_))));
    }

    #[tokio::test]
    async fn probe_all_continues_after_failures() {
        let accounts = vec![
            Account::new("a", "b", "bad host", "t"),
            Account::new("c", "d", "another bad host", "t"),
        ];
        let results = probe_all(&accounts).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].0.user, "c");
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }

    #[test]
    fn error_mapping() {
        assert_eq!(
            ProbeError::from(mailpoll_imap::Error::Timeout(Duration::from_secs(30))),
            ProbeError::Timeout(Duration::from_secs(30))
        );
        assert!(matches!(
            ProbeError::from(mailpoll_pop3::Error::ConnectionClosed),
            ProbeError::Connect(_)
        ));
        assert!(matches!(
            ProbeError::from(mailpoll_pop3::Error::Err("busy".into())),
            ProbeError::Protocol(_)
        ));
    }
}
