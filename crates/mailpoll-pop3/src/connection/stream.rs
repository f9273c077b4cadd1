//! Line-oriented POP3 stream and TLS setup.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::{Error, POP3S_PORT, Result};

/// Maximum reply line length (RFC 1939 allows 512 octets).
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// POP3 connection configuration. Connections always use implicit TLS.
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
    /// Creates a configuration for implicit TLS on port 995.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: POP3S_PORT,
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

/// Buffered POP3 stream.
#[derive(Debug)]
pub struct Pop3Stream<S> {
    reader: BufReader<S>,
}

impl<S> Pop3Stream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Reads one reply line without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on EOF and [`Error::Protocol`]
    /// for overlong lines.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut raw = Vec::new();
        let read = (&mut self.reader)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', &mut raw)
            .await?;
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        if !raw.ends_with(b"\n") {
            return Err(if read >= MAX_LINE_LENGTH {
                Error::Protocol("line too long".to_string())
            } else {
                Error::ConnectionClosed
            });
        }
        let line = String::from_utf8_lossy(&raw);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes data and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }
}

fn create_tls_connector() -> Result<TlsConnector> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Connects to the configured server with TLS from the start.
///
/// # Errors
///
/// Returns [`Error::Timeout`] when connect plus handshake exceed
/// [`Config::connect_timeout`], or the underlying I/O or TLS error.
pub async fn connect_tls(config: &Config) -> Result<Pop3Stream<TlsStream<TcpStream>>> {
    let server_name = ServerName::try_from(config.host.clone())?;
    let connector = create_tls_connector()?;
    let addr = format!("{}:{}", config.host, config.port);

    let handshake = async {
        let tcp = TcpStream::connect(&addr).await?;
        let tls = connector.connect(server_name, tcp).await?;
        Ok::<_, io::Error>(Pop3Stream::new(tls))
    };

    tokio::time::timeout(config.connect_timeout, handshake)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
        .map_err(Error::from)
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

    #[test]
    fn config_defaults() {
        let config = Config::new("pop.example.com");
        assert_eq!(config.port, 995);
        assert_eq!(config.with_port(1995).port, 1995);
    }

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mock = Builder::new().read(b"+OK ready\r\n").build();
        let mut stream = Pop3Stream::new(mock);
        assert_eq!(stream.read_line().await.unwrap(), "+OK ready");
    }

    #[tokio::test]
    async fn read_line_reports_eof() {
        let mock = Builder::new().build();
        let mut stream = Pop3Stream::new(mock);
        assert!(matches!(stream.read_line().await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn truncated_line_is_closed_connection() {
        let mock = Builder::new().read(b"+OK half").build();
        let mut stream = Pop3Stream::new(mock);
        assert!(matches!(stream.read_line().await, Err(Error::ConnectionClosed)));
    }

    #[test]
    fn connector_builds_with_explicit_provider() {
        assert!(create_tls_connector().is_ok());
    }

    #[tokio::test]
    async fn rejects_invalid_server_name() {
        let err = connect_tls(&Config::new("bad host")).await.err().unwrap();
        assert!(matches!(err, Error::InvalidDnsName(_)));
    }
}
