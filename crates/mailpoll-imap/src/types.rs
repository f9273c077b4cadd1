//! Core IMAP types.

/// Message sequence number (1-based position in the selected mailbox).
pub type SeqNum = u32;

/// Completion status of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command was malformed or not valid in this state.
    Bad,
    /// Connection is already authenticated (greeting only).
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Parses a status keyword, case-insensitively.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// What the server reported while opening a mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox (`* n EXISTS`).
    pub exists: u32,
    /// Whether the server confirmed read-only access (`[READ-ONLY]`).
    pub read_only: bool,
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
    fn parse_status_keywords() {
        assert_eq!(Status::parse("OK"), Some(Status::Ok));
        assert_eq!(Status::parse("no"), Some(Status::No));
        assert_eq!(Status::parse("Bad"), Some(Status::Bad));
        assert_eq!(Status::parse("PREAUTH"), Some(Status::PreAuth));
        assert_eq!(Status::parse("BYE"), Some(Status::Bye));
        assert_eq!(Status::parse("EXISTS"), None);
    }
}
