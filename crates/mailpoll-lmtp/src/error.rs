//! Error types for LMTP operations.

use std::io;

/// Result type alias for LMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// LMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server returned error response.
    #[error("LMTP error {code}: {message}")]
    LmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid envelope address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Server closed the connection before answering.
    #[error("Connection closed by server")]
    ConnectionClosed,
}

impl Error {
    /// Creates an LMTP error from a reply code and message.
    #[must_use]
    pub fn lmtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::LmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::LmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::LmtpError { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reply_codes() {
        assert!(Error::lmtp_error(550, "no such user").is_permanent());
        assert!(Error::lmtp_error(452, "over quota").is_transient());
        assert!(!Error::ConnectionClosed.is_permanent());
    }

    #[test]
    fn display_includes_code() {
        let err = Error::lmtp_error(550, "5.1.1 unknown user");
        assert_eq!(err.to_string(), "LMTP error 550: 5.1.1 unknown user");
    }
}
