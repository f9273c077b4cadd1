//! POP3 command builder.

use crate::{Error, Result};

/// POP3 command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - name the mailbox.
    User(String),
    /// PASS - password for the named mailbox.
    Pass(String),
    /// STAT - message count and total size.
    Stat,
    /// QUIT - end the session.
    Quit,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(name) => f.debug_tuple("User").field(name).finish(),
            Self::Pass(_) => f.debug_tuple("Pass").field(&"********").finish(),
            Self::Stat => f.write_str("Stat"),
            Self::Quit => f.write_str("Quit"),
        }
    }
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::Stat => "STAT",
            Self::Quit => "QUIT",
        }
    }

    /// Serializes the command to a CRLF-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if an argument contains CR or LF,
    /// which would split the command line.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.name().as_bytes());

        match self {
            Self::User(arg) | Self::Pass(arg) => {
                if arg.contains(['\r', '\n']) {
                    return Err(Error::InvalidArgument("line break in command argument"));
                }
                buf.push(b' ');
                buf.extend_from_slice(arg.as_bytes());
            }
            Self::Stat | Self::Quit => {}
        }

        buf.extend_from_slice(b"\r\n");
        Ok(buf)
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

    #[test]
    fn serializes_commands() {
        assert_eq!(
            Command::User("alice@example.com".to_string()).serialize().unwrap(),
            b"USER alice@example.com\r\n"
        );
        assert_eq!(
            Command::Pass("p@ss word".to_string()).serialize().unwrap(),
            b"PASS p@ss word\r\n"
        );
        assert_eq!(Command::Stat.serialize().unwrap(), b"STAT\r\n");
        assert_eq!(Command::Quit.serialize().unwrap(), b"QUIT\r\n");
    }

    #[test]
    fn rejects_line_breaks() {
        let err = Command::Pass("a\r\nDELE 1".to_string()).serialize().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn debug_masks_password() {
        let rendered = format!("{:?}", Command::Pass("hunter2".to_string()));
        assert!(!rendered.contains("hunter2"));
    }
}
