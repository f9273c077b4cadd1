//! Account model.

use super::protocol::Protocol;

/// One mailbox source to poll.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    /// Mailbox login identity.
    pub user: String,
    /// Secret credential, sent to the server verbatim.
    pub password: String,
    /// Retrieval server hostname.
    pub server: String,
    /// Local delivery destination (address or routing name).
    pub target: String,
}

impl Account {
    /// Creates an account from its four fields.
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            server: server.into(),
            target: target.into(),
        }
    }

    /// Retrieval protocol inferred from the server name.
    #[must_use]
    pub fn protocol(&self) -> Protocol {
        Protocol::select(&self.server)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("user", &self.user)
            .field("password", &"********")
            .field("server", &self.server)
            .field("target", &self.target)
            .finish()
    }
}

/// Renders `user@server`.
impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
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

    fn account() -> Account {
        Account::new("alice", "p@ss:w0rd", "imap.example.com", "alice@local")
    }

    #[test]
    fn display_is_identity() {
        assert_eq!(account().to_string(), "alice@imap.example.com");
    }

    #[test]
    fn debug_masks_password() {
        let rendered = format!("{:?}", account());
        assert!(rendered.contains("alice@local"));
        assert!(!rendered.contains("p@ss:w0rd"));
    }

    #[test]
    fn protocol_follows_server() {
        assert_eq!(account().protocol(), Protocol::ImapSsl);
        let pop = Account::new("bob", "x", "pop.example.com", "bob@local");
        assert_eq!(pop.protocol(), Protocol::Pop3Ssl);
    }
}
