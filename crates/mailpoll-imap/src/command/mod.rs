//! IMAP command encoding.
//!
//! Only the handful of commands the probe needs are modelled. Arguments are
//! written as atoms when safe, as quoted strings when they contain specials,
//! and as synchronizing literals when they carry CR, LF or 8-bit bytes.

mod tag_generator;

pub use tag_generator::TagGenerator;

/// IMAP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGIN - plaintext authentication.
    Login {
        /// User name.
        username: String,
        /// Password, sent verbatim.
        password: String,
    },
    /// EXAMINE - open a mailbox read-only.
    Examine {
        /// Mailbox name.
        mailbox: String,
    },
    /// SEARCH - find messages in the open mailbox.
    Search {
        /// Search key, written as-is (e.g. `ALL`).
        criteria: String,
    },
    /// LOGOUT - end the session.
    Logout,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"********")
                .finish(),
            Self::Examine { mailbox } => {
                f.debug_struct("Examine").field("mailbox", mailbox).finish()
            }
            Self::Search { criteria } => {
                f.debug_struct("Search").field("criteria", criteria).finish()
            }
            Self::Logout => f.write_str("Logout"),
        }
    }
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Examine { .. } => "EXAMINE",
            Self::Search { .. } => "SEARCH",
            Self::Logout => "LOGOUT",
        }
    }

    /// Serializes the command with the given tag.
    ///
    /// The result is split into chunks. Every chunk except the last ends
    /// with a synchronizing literal announcement (`{n}\r\n`); the client must
    /// wait for a `+` continuation from the server before sending the next
    /// chunk. Commands without literals produce a single chunk.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<Vec<u8>> {
        let mut writer = ChunkWriter::default();
        writer.push(tag.as_bytes());
        writer.push(b" ");
        writer.push(self.name().as_bytes());

        match self {
            Self::Login { username, password } => {
                writer.push(b" ");
                writer.astring(username);
                writer.push(b" ");
                writer.astring(password);
            }
            Self::Examine { mailbox } => {
                writer.push(b" ");
                writer.astring(mailbox);
            }
            Self::Search { criteria } => {
                writer.push(b" ");
                writer.push(criteria.as_bytes());
            }
            Self::Logout => {}
        }

        writer.push(b"\r\n");
        writer.finish()
    }
}

#[derive(Default)]
struct ChunkWriter {
    chunks: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl ChunkWriter {
    fn push(&mut self, bytes: &[u8]) {
        self.current.extend_from_slice(bytes);
    }

    fn astring(&mut self, s: &str) {
        if s.bytes().any(needs_literal) {
            self.current
                .extend_from_slice(format!("{{{}}}\r\n", s.len()).as_bytes());
            self.chunks.push(std::mem::take(&mut self.current));
            self.current.extend_from_slice(s.as_bytes());
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            self.current.push(b'"');
            for b in s.bytes() {
                if b == b'"' || b == b'\\' {
                    self.current.push(b'\\');
                }
                self.current.push(b);
            }
            self.current.push(b'"');
        } else {
            self.current.extend_from_slice(s.as_bytes());
        }
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        self.chunks.push(self.current);
        self.chunks
    }
}

/// Bytes that cannot appear inside a quoted string.
const fn needs_literal(b: u8) -> bool {
    b == b'\r' || b == b'\n' || b >= 0x80
}

/// Bytes that force an atom into a quoted string.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b == 0x7F
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

    fn login(username: &str, password: &str) -> Command {
        Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn login_with_atoms() {
        let chunks = login("alice", "secret").serialize("A0000");
        assert_eq!(chunks, vec![b"A0000 LOGIN alice secret\r\n".to_vec()]);
    }

    #[test]
    fn login_quotes_specials() {
        let chunks = login("alice@example.com", r#"pa ss"w\d"#).serialize("A0001");
        assert_eq!(
            chunks,
            vec![b"A0001 LOGIN alice@example.com \"pa ss\\\"w\\\\d\"\r\n".to_vec()]
        );
    }

    #[test]
    fn login_empty_password_is_quoted() {
        let chunks = login("bob", "").serialize("A0002");
        assert_eq!(chunks, vec![b"A0002 LOGIN bob \"\"\r\n".to_vec()]);
    }

    #[test]
    fn login_non_ascii_password_uses_literal() {
        let chunks = login("bob", "pässword").serialize("A0003");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], b"A0003 LOGIN bob {9}\r\n".to_vec());
        assert_eq!(chunks[1], "pässword\r\n".as_bytes().to_vec());
    }

    #[test]
    fn examine_and_search() {
        let examine = Command::Examine {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(examine.serialize("A0004"), vec![b"A0004 EXAMINE INBOX\r\n".to_vec()]);

        let search = Command::Search {
            criteria: "ALL".to_string(),
        };
        assert_eq!(search.serialize("A0005"), vec![b"A0005 SEARCH ALL\r\n".to_vec()]);
    }

    #[test]
    fn logout_has_no_arguments() {
        assert_eq!(Command::Logout.serialize("A2"), vec![b"A2 LOGOUT\r\n".to_vec()]);
    }

    #[test]
    fn debug_masks_password() {
        let rendered = format!("{:?}", login("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
