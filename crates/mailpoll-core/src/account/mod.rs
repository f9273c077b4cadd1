//! Account management module.
//!
//! Provides the account model, the account list reader and protocol
//! selection.

mod model;
mod protocol;
mod store;

pub use model::Account;
pub use protocol::Protocol;
pub use store::{ParseError, load_accounts, parse_accounts, parse_line};
