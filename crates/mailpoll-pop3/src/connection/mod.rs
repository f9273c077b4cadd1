//! POP3 connection management.

mod client;
mod stream;

pub use client::{Authorization, Client, Transaction};
pub use stream::{Config, Pop3Stream, connect_tls};
