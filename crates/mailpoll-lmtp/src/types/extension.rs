//! Service extensions advertised in the LHLO response.

/// LMTP extensions discovered from LHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// ENHANCEDSTATUSCODES - RFC 3463 status codes in replies
    EnhancedStatusCodes,
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// CHUNKING - Chunked message transfer
    Chunking,
    /// SMTPUTF8 - UTF-8 envelope addresses
    SmtpUtf8,
    /// Unknown extension
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from LHLO response.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_uppercase().as_str() {
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "ENHANCEDSTATUSCODES" => Self::EnhancedStatusCodes,
            "SIZE" => Self::Size(parts.next().and_then(|s| s.parse().ok())),
            "CHUNKING" => Self::Chunking,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_keywords() {
        assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
        assert_eq!(Extension::parse("pipelining"), Extension::Pipelining);
        assert_eq!(
            Extension::parse("ENHANCEDSTATUSCODES"),
            Extension::EnhancedStatusCodes
        );
    }

    #[test]
    fn parse_size() {
        assert_eq!(Extension::parse("SIZE 1048576"), Extension::Size(Some(1_048_576)));
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            Extension::parse("XCLIENT ADDR"),
            Extension::Unknown("XCLIENT ADDR".to_string())
        );
        assert_eq!(Extension::parse(""), Extension::Unknown(String::new()));
    }
}
