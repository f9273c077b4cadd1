//! IMAP connection management.
//!
//! - Configuration (host, port, connect timeout)
//! - TLS stream setup
//! - Framed I/O for the IMAP line protocol
//! - Type-state client

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use config::Config;
pub use framed::FramedStream;
pub use stream::{ImapStream, connect_tls, create_tls_connector};
