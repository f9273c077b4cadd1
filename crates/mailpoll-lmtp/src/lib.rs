//! # mailpoll-lmtp
//!
//! A small LMTP client (RFC 2033) for handing fetched messages to a local
//! mail store such as Dovecot.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   LMTP state transitions
//! - **Single-recipient transactions**: one envelope recipient per message,
//!   so the end of DATA yields exactly one reply
//! - **Dot-stuffing and CRLF normalization** of the message body
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpoll_lmtp::{Address, Client};
//! use mailpoll_lmtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> mailpoll_lmtp::Result<()> {
//!     let stream = connect("dovecot", 24).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.lhlo("mailpoll.localhost").await?;
//!
//!     let client = client
//!         .mail_from(Some(Address::new("getmail-fetcher@localhost")?))
//!         .await?;
//!     let client = client.rcpt_to(Address::new("alice@local")?).await?;
//!     let client = client.data().await?;
//!
//!     let (client, _reply) = client.send_message(b"Subject: hi\r\n\r\nhello\r\n").await?;
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── lhlo() ───→ Ready
//! └──────────────┘
//!                     Ready ─── mail_from() ───→ MailTransaction
//!                           ───→ RecipientAdded ───→ Data ───→ Ready
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

pub use connection::{
    Client, Connected, Data, LmtpStream, MailTransaction, Ready, RecipientAdded, ServerInfo,
};
pub use error::{Error, Result};
pub use types::{Address, Extension, Reply, ReplyCode};

/// Default LMTP port used by Dovecot's inet listener.
pub const DEFAULT_PORT: u16 = 24;
