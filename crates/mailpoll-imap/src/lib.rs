//! # mailpoll-imap
//!
//! A deliberately small IMAP client (RFC 3501 / RFC 9051 subset) used by the
//! mailpoll diagnostic probe. It can log in, open a mailbox read-only and
//! count messages; it never stores flags or expunges.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpoll_imap::{Client, Config};
//! use mailpoll_imap::connection::connect_tls;
//!
//! #[tokio::main]
//! async fn main() -> mailpoll_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let stream = connect_tls(&config).await?;
//!     let client = Client::from_stream(stream).await?;
//!
//!     let client = client.login("user@example.com", "password").await?;
//!     let (mut client, status) = client.examine("INBOX").await?;
//!     println!("Messages: {}", status.exists);
//!
//!     let ids = client.search("ALL").await?;
//!     println!("Matched: {}", ids.len());
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌─────────────────────┐
//! │   NotAuthenticated  │ ─── login() ───→ Authenticated
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    Authenticated    │ ─── examine() ───→ Selected
//! └─────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, FramedStream, ImapStream, NotAuthenticated, Selected,
};
pub use error::{Error, Result};
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use types::{MailboxStatus, SeqNum, Status};

/// Implicit-TLS IMAP port.
pub const IMAPS_PORT: u16 = 993;
