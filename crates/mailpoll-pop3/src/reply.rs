//! POP3 reply parsing.

use crate::{Error, Result};

/// A single-line POP3 status reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// `true` for `+OK`, `false` for `-ERR`.
    pub ok: bool,
    /// Text following the status indicator.
    pub text: String,
}

impl Reply {
    /// Parses a status line (without its CRLF).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when the line starts with neither `+OK`
    /// nor `-ERR`.
    pub fn parse(line: &str) -> Result<Self> {
        let (ok, rest) = if let Some(rest) = strip_status(line, "+OK") {
            (true, rest)
        } else if let Some(rest) = strip_status(line, "-ERR") {
            (false, rest)
        } else {
            return Err(Error::Protocol(format!("unexpected reply: {line:?}")));
        };

        Ok(Self {
            ok,
            text: rest.trim().to_string(),
        })
    }

    /// Converts a `-ERR` reply into [`Error::Err`].
    ///
    /// # Errors
    ///
    /// Returns the server's error text when the reply is negative.
    pub fn into_result(self) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(Error::Err(self.text))
        }
    }
}

fn strip_status<'a>(line: &'a str, status: &str) -> Option<&'a str> {
    let head = line.get(..status.len())?;
    if !head.eq_ignore_ascii_case(status) {
        return None;
    }
    let rest = &line[status.len()..];
    (rest.is_empty() || rest.starts_with(' ')).then_some(rest)
}

/// Mailbox size from a STAT reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// Number of messages.
    pub count: u32,
    /// Total size in octets.
    pub size: u64,
}

impl Stat {
    /// Parses the text of a positive STAT reply: `nn mm`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when the counts are missing or not numeric.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split_ascii_whitespace();
        let invalid = || Error::Protocol(format!("malformed STAT reply: {text:?}"));

        let count = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let size = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        Ok(Self { count, size })
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
    use proptest::prelude::*;

    #[test]
    fn parses_status_lines() {
        assert_eq!(
            Reply::parse("+OK Dovecot ready.").unwrap(),
            Reply {
                ok: true,
                text: "Dovecot ready.".to_string()
            }
        );
        assert_eq!(
            Reply::parse("-ERR [AUTH] Authentication failed.").unwrap(),
            Reply {
                ok: false,
                text: "[AUTH] Authentication failed.".to_string()
            }
        );
        assert!(Reply::parse("+OK").unwrap().ok);
        assert!(Reply::parse("+ok lower").unwrap().ok);
    }

    #[test]
    fn rejects_other_lines() {
        assert!(Reply::parse("").is_err());
        assert!(Reply::parse("* OK imap").is_err());
        assert!(Reply::parse("+OKAY").is_err());
        assert!(Reply::parse("+Ö").is_err());
    }

    #[test]
    fn negative_reply_becomes_error() {
        let err = Reply::parse("-ERR no").unwrap().into_result().unwrap_err();
        assert!(matches!(err, Error::Err(text) if text == "no"));
    }

    #[test]
    fn parses_stat() {
        assert_eq!(
            Stat::parse("2 320").unwrap(),
            Stat {
                count: 2,
                size: 320
            }
        );
        assert_eq!(Stat::parse("0 0").unwrap(), Stat::default());
        assert!(Stat::parse("").is_err());
        assert!(Stat::parse("2").is_err());
        assert!(Stat::parse("two 320").is_err());
    }

    proptest! {
        #[test]
        fn stat_values_survive(count in any::<u32>(), size in any::<u64>()) {
            let parsed = Stat::parse(&format!("{count} {size}")).unwrap();
            prop_assert_eq!(parsed, Stat { count, size });
        }

        #[test]
        fn reply_parse_never_panics(line in ".*") {
            let _ = Reply::parse(&line);
        }
    }
}
