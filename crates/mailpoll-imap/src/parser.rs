//! IMAP response parser.
//!
//! Parses the response lines a probe session can encounter: greetings,
//! tagged completions, continuation requests and the untagged data
//! produced by CAPABILITY, EXAMINE and SEARCH. Anything else is kept as
//! [`UntaggedResponse::Other`].

use crate::types::{SeqNum, Status};
use crate::{Error, Result};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged command completion.
    Tagged {
        /// Tag of the completed command.
        tag: String,
        /// Completion status.
        status: Status,
        /// Bracketed response code, e.g. `READ-ONLY`.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged server data.
    Untagged(UntaggedResponse),
    /// Continuation request (`+ ...`).
    Continuation(String),
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK ...`
    Ok {
        /// Bracketed response code.
        code: Option<String>,
        /// Text.
        text: String,
    },
    /// `* NO ...`
    No {
        /// Bracketed response code.
        code: Option<String>,
        /// Text.
        text: String,
    },
    /// `* BAD ...`
    Bad {
        /// Bracketed response code.
        code: Option<String>,
        /// Text.
        text: String,
    },
    /// `* PREAUTH ...`
    PreAuth {
        /// Bracketed response code.
        code: Option<String>,
        /// Text.
        text: String,
    },
    /// `* BYE ...`
    Bye {
        /// Bracketed response code.
        code: Option<String>,
        /// Text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<String>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* SEARCH n n n`
    Search(Vec<SeqNum>),
    /// Any other untagged line, kept verbatim without the leading `* `.
    Other(String),
}

/// Stateless response parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a single response as returned by the framed reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the response is not valid IMAP.
    pub fn parse(raw: &[u8]) -> Result<Response> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix('+') {
            return Ok(Response::Continuation(rest.trim_start().to_string()));
        }

        if let Some(rest) = line.strip_prefix("* ") {
            return parse_untagged(rest).map(Response::Untagged);
        }

        let (tag, rest) = line.split_once(' ').ok_or_else(|| Error::Parse {
            position: line.len(),
            message: "expected tag followed by status".to_string(),
        })?;
        if tag.is_empty() {
            return Err(Error::Parse {
                position: 0,
                message: "empty tag".to_string(),
            });
        }

        let (word, text) = split_word(rest);
        let status = Status::parse(word).ok_or_else(|| Error::Parse {
            position: tag.len() + 1,
            message: format!("unknown status {word:?}"),
        })?;
        let (code, text) = split_code(text);

        Ok(Response::Tagged {
            tag: tag.to_string(),
            status,
            code,
            text,
        })
    }
}

fn parse_untagged(rest: &str) -> Result<UntaggedResponse> {
    let (word, tail) = split_word(rest);

    if let Ok(n) = word.parse::<u32>() {
        let (keyword, _) = split_word(tail);
        return Ok(match keyword.to_ascii_uppercase().as_str() {
            "EXISTS" => UntaggedResponse::Exists(n),
            "RECENT" => UntaggedResponse::Recent(n),
            _ => UntaggedResponse::Other(rest.to_string()),
        });
    }

    if let Some(status) = Status::parse(word) {
        let (code, text) = split_code(tail);
        return Ok(match status {
            Status::Ok => UntaggedResponse::Ok { code, text },
            Status::No => UntaggedResponse::No { code, text },
            Status::Bad => UntaggedResponse::Bad { code, text },
            Status::PreAuth => UntaggedResponse::PreAuth { code, text },
            Status::Bye => UntaggedResponse::Bye { code, text },
        });
    }

    match word.to_ascii_uppercase().as_str() {
        "CAPABILITY" => Ok(UntaggedResponse::Capability(
            tail.split_ascii_whitespace().map(str::to_string).collect(),
        )),
        "SEARCH" => {
            let ids = tail
                .split_ascii_whitespace()
                .map(|id| {
                    id.parse::<SeqNum>().map_err(|_| Error::Parse {
                        position: 0,
                        message: format!("invalid sequence number {id:?} in SEARCH"),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(UntaggedResponse::Search(ids))
        }
        "" => Err(Error::Parse {
            position: 2,
            message: "empty untagged response".to_string(),
        }),
        _ => Ok(UntaggedResponse::Other(rest.to_string())),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    s.split_once(' ').unwrap_or((s, ""))
}

/// Splits a leading `[CODE ...]` off the response text.
fn split_code(text: &str) -> (Option<String>, String) {
    if let Some(inner) = text.strip_prefix('[')
        && let Some(end) = inner.find(']')
    {
        let code = inner[..end].to_string();
        let rest = inner[end + 1..].trim_start().to_string();
        return (Some(code), rest);
    }
    (None, text.to_string())
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
    fn parse_greeting_with_capability_code() {
        let resp = ResponseParser::parse(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] Dovecot ready.\r\n")
            .unwrap();
        assert_eq!(
            resp,
            Response::Untagged(UntaggedResponse::Ok {
                code: Some("CAPABILITY IMAP4rev1 AUTH=PLAIN".to_string()),
                text: "Dovecot ready.".to_string(),
            })
        );
    }

    #[test]
    fn parse_tagged_read_only() {
        let resp = ResponseParser::parse(b"A0001 OK [READ-ONLY] Examine completed\r\n").unwrap();
        assert_eq!(
            resp,
            Response::Tagged {
                tag: "A0001".to_string(),
                status: Status::Ok,
                code: Some("READ-ONLY".to_string()),
                text: "Examine completed".to_string(),
            }
        );
    }

    #[test]
    fn parse_tagged_no() {
        let resp =
            ResponseParser::parse(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                .unwrap();
        let Response::Tagged { status, text, .. } = resp else {
            panic!("expected tagged response");
        };
        assert_eq!(status, Status::No);
        assert_eq!(text, "Invalid credentials");
    }

    #[test]
    fn parse_exists_and_recent() {
        assert_eq!(
            ResponseParser::parse(b"* 172 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(172))
        );
        assert_eq!(
            ResponseParser::parse(b"* 1 RECENT\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Recent(1))
        );
    }

    #[test]
    fn parse_search_results() {
        assert_eq!(
            ResponseParser::parse(b"* SEARCH 2 84 882\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![2, 84, 882]))
        );
        assert_eq!(
            ResponseParser::parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![]))
        );
        assert!(ResponseParser::parse(b"* SEARCH 1 x\r\n").is_err());
    }

    #[test]
    fn parse_capability_and_other() {
        assert_eq!(
            ResponseParser::parse(b"* CAPABILITY IMAP4rev1 IDLE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Capability(vec![
                "IMAP4rev1".to_string(),
                "IDLE".to_string()
            ]))
        );
        assert_eq!(
            ResponseParser::parse(b"* FLAGS (\\Seen \\Deleted)\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other("FLAGS (\\Seen \\Deleted)".to_string()))
        );
    }

    #[test]
    fn parse_continuation_and_bye() {
        assert_eq!(
            ResponseParser::parse(b"+ Ready for literal\r\n").unwrap(),
            Response::Continuation("Ready for literal".to_string())
        );
        assert_eq!(
            ResponseParser::parse(b"* BYE Logging out\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Bye {
                code: None,
                text: "Logging out".to_string()
            })
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ResponseParser::parse(b"garbage\r\n").is_err());
        assert!(ResponseParser::parse(b"A1 MAYBE done\r\n").is_err());
        assert!(ResponseParser::parse(b"* \r\n").is_err());
    }

    proptest! {
        #[test]
        fn parser_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..200)) {
            let _ = ResponseParser::parse(&raw);
        }

        #[test]
        fn search_ids_survive(ids in proptest::collection::vec(1u32..1_000_000, 0..50)) {
            let line = format!(
                "* SEARCH {}\r\n",
                ids.iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
            );
            let parsed = ResponseParser::parse(line.as_bytes()).unwrap();
            prop_assert_eq!(parsed, Response::Untagged(UntaggedResponse::Search(ids)));
        }
    }
}
