//! Retrieval protocol selection.

/// Retrieval protocol for an account. Both variants use implicit TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// IMAP over TLS.
    ImapSsl,
    /// POP3 over TLS.
    Pop3Ssl,
}

impl Protocol {
    /// Infers the protocol from a server hostname.
    ///
    /// Any hostname containing `pop` (case-insensitive) is POP3; everything
    /// else is IMAP. This is a naming heuristic only: `popular-mail.example.com`
    /// is classified as POP3.
    #[must_use]
    pub fn select(server: &str) -> Self {
        if server.to_ascii_lowercase().contains("pop") {
            Self::Pop3Ssl
        } else {
            Self::ImapSsl
        }
    }

    /// getmail retriever type for this protocol.
    #[must_use]
    pub const fn retriever_type(self) -> &'static str {
        match self {
            Self::ImapSsl => "SimpleIMAPSSLRetriever",
            Self::Pop3Ssl => "SimplePOP3SSLRetriever",
        }
    }

    /// Maps a getmail retriever type back to a protocol.
    #[must_use]
    pub fn from_retriever_type(retriever: &str) -> Option<Self> {
        match retriever {
            "SimpleIMAPSSLRetriever" => Some(Self::ImapSsl),
            "SimplePOP3SSLRetriever" => Some(Self::Pop3Ssl),
            _ => None,
        }
    }

    /// Implicit-TLS port.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::ImapSsl => mailpoll_imap::IMAPS_PORT,
            Self::Pop3Ssl => mailpoll_pop3::POP3S_PORT,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ImapSsl => "IMAP_SSL",
            Self::Pop3Ssl => "POP3_SSL",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
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
    fn selects_by_name() {
        assert_eq!(Protocol::select("mail.POP.example.com"), Protocol::Pop3Ssl);
        assert_eq!(Protocol::select("pop3.gmx.net"), Protocol::Pop3Ssl);
        assert_eq!(Protocol::select("imap.example.com"), Protocol::ImapSsl);
        assert_eq!(Protocol::select(""), Protocol::ImapSsl);
    }

    #[test]
    fn popular_hostname_is_pop3() {
        assert_eq!(Protocol::select("popular-mail.example.com"), Protocol::Pop3Ssl);
    }

    #[test]
    fn retriever_types_and_ports() {
        assert_eq!(Protocol::ImapSsl.retriever_type(), "SimpleIMAPSSLRetriever");
        assert_eq!(Protocol::Pop3Ssl.retriever_type(), "SimplePOP3SSLRetriever");
        assert_eq!(
            Protocol::from_retriever_type("SimplePOP3SSLRetriever"),
            Some(Protocol::Pop3Ssl)
        );
        assert_eq!(Protocol::from_retriever_type("BrokenRetriever"), None);
        assert_eq!(Protocol::ImapSsl.default_port(), 993);
        assert_eq!(Protocol::Pop3Ssl.default_port(), 995);
    }

    proptest! {
        #[test]
        fn selection_ignores_case(server in "[a-zA-Z0-9.-]{0,30}") {
            prop_assert_eq!(
                Protocol::select(&server),
                Protocol::select(&server.to_ascii_uppercase())
            );
        }
    }
}
