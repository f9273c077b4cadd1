//! Envelope address types.

use crate::error::{Error, Result};

/// Envelope address for an LMTP transaction.
///
/// LMTP servers usually route on the local part alone, so a bare user name
/// such as `alice` is accepted as well as a full `alice@example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty or cannot be placed inside
    /// angle brackets on a command line.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {addr:?}"
            )));
        }

        if let Some((local, domain)) = addr.rsplit_once('@')
            && (local.is_empty() || domain.is_empty())
        {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_full_address() {
        let addr = Address::new("alice@local").unwrap();
        assert_eq!(addr.as_str(), "alice@local");
    }

    #[test]
    fn test_bare_local_name() {
        assert!(Address::new("alice").is_ok());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("").is_err());
        assert!(Address::new("@local").is_err());
        assert!(Address::new("alice@").is_err());
        assert!(Address::new("ali ce@local").is_err());
        assert!(Address::new("<alice@local>").is_err());
        assert!(Address::new("alice@local\r\nRSET").is_err());
    }
}
