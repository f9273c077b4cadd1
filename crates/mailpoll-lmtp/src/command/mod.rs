//! LMTP command builder.

use crate::types::Address;

/// LMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LHLO - LMTP greeting (replaces HELO/EHLO)
    Lhlo {
        /// Client hostname
        hostname: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address, `None` for the null reverse-path
        from: Option<Address>,
        /// BODY parameter (7BIT, 8BITMIME)
        body: Option<String>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Lhlo { hostname } => {
                buf.extend_from_slice(b"LHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::MailFrom { from, body } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                if let Some(from) = from {
                    buf.extend_from_slice(from.as_str().as_bytes());
                }
                buf.push(b'>');
                if let Some(body_type) = body {
                    buf.extend_from_slice(b" BODY=");
                    buf.extend_from_slice(body_type.as_bytes());
                }
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_lhlo_command() {
        let cmd = Command::Lhlo {
            hostname: "mailpoll.localhost".to_string(),
        };
        assert_eq!(cmd.serialize(), b"LHLO mailpoll.localhost\r\n");
    }

    #[test]
    fn test_mail_from_simple() {
        let cmd = Command::MailFrom {
            from: Some(Address::new("getmail-fetcher@localhost").unwrap()),
            body: None,
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<getmail-fetcher@localhost>\r\n");
    }

    #[test]
    fn test_mail_from_null_sender_with_body() {
        let cmd = Command::MailFrom {
            from: None,
            body: Some("8BITMIME".to_string()),
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<> BODY=8BITMIME\r\n");
    }

    #[test]
    fn test_rcpt_to_local_name() {
        let cmd = Command::RcptTo {
            to: Address::new("alice").unwrap(),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<alice>\r\n");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
