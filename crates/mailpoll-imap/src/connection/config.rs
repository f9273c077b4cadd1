//! Connection configuration.

use std::time::Duration;

use crate::IMAPS_PORT;

/// IMAP connection configuration. Connections always use implicit TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Limit for TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a configuration for implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: IMAPS_PORT,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
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

    #[test]
    fn defaults_to_imaps() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_methods() {
        let config = Config::new("imap.example.com")
            .with_port(1993)
            .with_connect_timeout(Duration::from_secs(5));
        assert_eq!(config.port, 1993);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }
}
