//! Completion webhook.

use std::time::Duration;

use tracing::{info, warn};

/// Request timeout for the webhook.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook failure. Logged by [`Notifier::notify`], never propagated.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request failed or timed out.
    #[error("webhook request failed: {0}")]
    Request(#[source] reqwest::Error),
}

/// Fires one HTTP GET after each completed cycle.
#[derive(Debug, Clone)]
pub struct Notifier {
    url: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    /// Creates a notifier; `None` disables it.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Client`] if the TLS backend cannot be set up.
    pub fn new(url: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(NotifyError::Client)?;
        Ok(Self { url, client })
    }

    /// Whether a webhook is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Calls the webhook once and returns the HTTP status, or `None` when no
    /// webhook is configured. Any status counts as delivered.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Request`] on transport failure or timeout.
    pub async fn try_notify(&self) -> Result<Option<u16>, NotifyError> {
        let Some(url) = &self.url else {
            return Ok(None);
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(NotifyError::Request)?;
        Ok(Some(response.status().as_u16()))
    }

    /// Calls the webhook once, logging the outcome. Never fails and never
    /// retries.
    pub async fn notify(&self) {
        if !self.is_enabled() {
            return;
        }
        info!("Calling success webhook");
        match self.try_notify().await {
            Ok(Some(status)) => info!(status, "Webhook response"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Webhook failed"),
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
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves one request with the given status line and returns the request head.
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ping?cycle=done", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn disabled_notifier_does_nothing() {
        let notifier = Notifier::new(None).unwrap();
        assert!(!notifier.is_enabled());
        assert_eq!(notifier.try_notify().await.unwrap(), None);
        notifier.notify().await;
    }

    #[tokio::test]
    async fn sends_get_and_reports_status() {
        let (url, server) = one_shot_server("204 No Content").await;
        let notifier = Notifier::new(Some(url)).unwrap();

        assert_eq!(notifier.try_notify().await.unwrap(), Some(204));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /ping?cycle=done HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn error_status_is_not_a_failure() {
        let (url, _server) = one_shot_server("500 Internal Server Error").await;
        let notifier = Notifier::new(Some(url)).unwrap();
        assert_eq!(notifier.try_notify().await.unwrap(), Some(500));
    }

    #[tokio::test]
    async fn transport_failure_is_contained() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let notifier = Notifier::new(Some(url)).unwrap();
        assert!(matches!(
            notifier.try_notify().await,
            Err(NotifyError::Request(_))
        ));
        notifier.notify().await;
    }
}
