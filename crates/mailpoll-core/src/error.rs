//! Error types for the core library.

use thiserror::Error;

/// Errors that stop the daemon from starting.
///
/// Per-account fetch and connection failures never surface here; they are
/// recorded in the cycle report instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Delivery setup or delivery failed.
    #[error("Delivery error: {0}")]
    Delivery(#[from] crate::delivery::DeliveryError),

    /// The completion webhook could not be set up.
    #[error("Notifier error: {0}")]
    Notify(#[from] crate::notify::NotifyError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    use std::io;
    use std::path::PathBuf;

    use super::*;
    use crate::delivery::DeliveryError;

    #[test]
    fn wraps_start_up_errors() {
        let err: Error = DeliveryError::RelayConfig {
            path: PathBuf::from("/etc/msmtprc"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(matches!(err, Error::Delivery(_)));
        assert!(err.to_string().starts_with("Delivery error: "));
    }
}
