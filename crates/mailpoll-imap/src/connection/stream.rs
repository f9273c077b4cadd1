//! Implicit-TLS connection setup.

#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::Config;
use crate::{Error, Result};

/// An implicit-TLS IMAP connection.
pub type ImapStream = TlsStream<TcpStream>;

/// TLS connector trusting the bundled web PKI roots.
///
/// Uses the `ring` provider explicitly, never the process default.
pub fn create_tls_connector() -> Result<TlsConnector> {
    let roots: rustls::RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Opens TCP to `host:port` and performs the TLS handshake.
///
/// Both steps together are bounded by [`Config::connect_timeout`];
/// exceeding it yields [`Error::Timeout`].
pub async fn connect_tls(config: &Config) -> Result<ImapStream> {
    let server_name = ServerName::try_from(config.host.clone())?;
    let connector = create_tls_connector()?;

    let connect = async {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        Ok::<_, Error>(connector.connect(server_name, tcp).await?)
    };

    tokio::time::timeout(config.connect_timeout, connect)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
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
    use std::time::Duration;

    use super::*;

    #[test]
    fn connector_builds_with_explicit_provider() {
        assert!(create_tls_connector().is_ok());
    }

    #[tokio::test]
    async fn rejects_invalid_server_name() {
        let config = Config::new("not a hostname");
        let err = connect_tls(&config).await.err().unwrap();
        assert!(matches!(err, Error::InvalidDnsName(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_io_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::new("localhost")
            .with_port(port)
            .with_connect_timeout(Duration::from_secs(5));
        let err = connect_tls(&config).await.err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }
}
