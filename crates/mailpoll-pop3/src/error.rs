//! Error types for POP3 operations.

use std::time::Duration;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server answered `-ERR`.
    #[error("Server returned -ERR: {0}")]
    Err(String),

    /// USER or PASS was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed or unexpected server reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Argument cannot be sent on a POP3 command line.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,
}
