//! LMTP reply types.

use std::fmt;

/// One reply: a three digit code and its text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code.
    pub code: ReplyCode,
    /// Text of each line, code and separator stripped.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.class() == 2
    }

    /// All lines joined with newlines.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

/// Numeric reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// `220` greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// `221` answer to QUIT.
    pub const CLOSING: Self = Self(221);
    /// `250` accepted.
    pub const OK: Self = Self(250);
    /// `354` send the message.
    pub const START_DATA: Self = Self(354);

    /// Wraps a raw code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Raw code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// First digit: 2 success, 3 intermediate, 4 transient, 5 permanent.
    #[must_use]
    pub const fn class(self) -> u16 {
        self.0 / 100
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert_eq!(ReplyCode::OK.class(), 2);
        assert_eq!(ReplyCode::START_DATA.class(), 3);
        assert_eq!(ReplyCode::new(452).class(), 4);
        assert_eq!(ReplyCode::new(550).class(), 5);
        assert_eq!(ReplyCode::CLOSING.to_string(), "221");
    }

    #[test]
    fn only_2xx_is_success() {
        assert!(Reply::new(ReplyCode::SERVICE_READY, vec![]).is_success());
        assert!(!Reply::new(ReplyCode::START_DATA, vec![]).is_success());

        let rejected = Reply::new(
            ReplyCode::new(550),
            vec!["5.1.1 <bob@local> User doesn't exist".to_string()],
        );
        assert!(!rejected.is_success());
        assert_eq!(rejected.message_text(), "5.1.1 <bob@local> User doesn't exist");
    }

    #[test]
    fn multi_line_text() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec!["dovecot".to_string(), "PIPELINING".to_string()],
        );
        assert_eq!(reply.message_text(), "dovecot\nPIPELINING");
    }
}
