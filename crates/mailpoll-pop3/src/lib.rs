//! # mailpoll-pop3
//!
//! A minimal POP3 client (RFC 1939) over implicit TLS, used by the mailpoll
//! diagnostic probe to check credentials and count messages.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpoll_pop3::{Client, Config};
//! use mailpoll_pop3::connection::connect_tls;
//!
//! #[tokio::main]
//! async fn main() -> mailpoll_pop3::Result<()> {
//!     let stream = connect_tls(&Config::new("pop.example.com")).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let mut client = client.login("user@example.com", "password").await?;
//!     let stat = client.stat().await?;
//!     println!("{} messages, {} octets", stat.count, stat.size);
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Authorization ─── login() ───→ Transaction ─── quit() ───→ (closed)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod reply;

pub use command::Command;
pub use connection::{Authorization, Client, Config, Pop3Stream, Transaction};
pub use error::{Error, Result};
pub use reply::{Reply, Stat};

/// Implicit-TLS POP3 port.
pub const POP3S_PORT: u16 = 995;
