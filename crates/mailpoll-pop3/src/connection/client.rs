//! Type-state POP3 client.

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::stream::Pop3Stream;
use crate::command::Command;
use crate::reply::{Reply, Stat};
use crate::{Error, Result};

/// Greeting received, not yet authenticated.
#[derive(Debug, Clone, Copy)]
pub struct Authorization;

/// Authenticated; the maildrop is locked.
#[derive(Debug, Clone, Copy)]
pub struct Transaction;

/// POP3 client with type-state.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: Pop3Stream<S>,
    greeting: String,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Sends QUIT and closes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects QUIT. In the transaction state
    /// this means pending deletions were not committed.
    pub async fn quit(mut self) -> Result<()> {
        self.command(&Command::Quit).await?.into_result()?;
        Ok(())
    }

    async fn command(&mut self, command: &Command) -> Result<Reply> {
        debug!(command = command.name(), "POP3 command");
        self.stream.write_all(&command.serialize()?).await?;
        let line = self.stream.read_line().await?;
        Reply::parse(&line)
    }
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Err`] if the server greets with `-ERR`.
    pub async fn from_stream(mut stream: Pop3Stream<S>) -> Result<Self> {
        let line = stream.read_line().await?;
        let greeting = Reply::parse(&line)?.into_result()?;
        Ok(Self {
            stream,
            greeting: greeting.text,
            _state: PhantomData,
        })
    }

    /// Authenticates with USER and PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when either command is answered with `-ERR`.
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Transaction>> {
        for command in [
            Command::User(username.to_string()),
            Command::Pass(password.to_string()),
        ] {
            let reply = self.command(&command).await?;
            if !reply.ok {
                return Err(Error::Auth(reply.text));
            }
        }

        Ok(Client {
            stream: self.stream,
            greeting: self.greeting,
            _state: PhantomData,
        })
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and maildrop size.
    ///
    /// # Errors
    ///
    /// Returns an error on `-ERR` or a malformed reply.
    pub async fn stat(&mut self) -> Result<Stat> {
        let reply = self.command(&Command::Stat).await?.into_result()?;
        Stat::parse(&reply.text)
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
    use tokio_test::io::Builder;

    fn expect_err<T>(result: Result<T>) -> Error {
        match result {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        }
    }

    #[tokio::test]
    async fn full_session() {
        let mock = Builder::new()
            .read(b"+OK Dovecot ready.\r\n")
            .write(b"USER alice@example.com\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK Logged in.\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK 2 320\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK Logging out.\r\n")
            .build();

        let client = Client::from_stream(Pop3Stream::new(mock)).await.unwrap();
        assert_eq!(client.greeting(), "Dovecot ready.");
        let mut client = client.login("alice@example.com", "secret").await.unwrap();
        let stat = client.stat().await.unwrap();
        assert_eq!(stat.count, 2);
        assert_eq!(stat.size, 320);
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_password_is_auth_error() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS wrong\r\n")
            .read(b"-ERR [AUTH] Authentication failed.\r\n")
            .build();

        let client = Client::from_stream(Pop3Stream::new(mock)).await.unwrap();
        let err = expect_err(client.login("alice", "wrong").await);
        assert!(matches!(err, Error::Auth(text) if text == "[AUTH] Authentication failed."));
    }

    #[tokio::test]
    async fn negative_greeting_is_an_error() {
        let mock = Builder::new().read(b"-ERR too busy\r\n").build();
        let err = expect_err(Client::from_stream(Pop3Stream::new(mock)).await);
        assert!(matches!(err, Error::Err(_)));
    }

    #[tokio::test]
    async fn malformed_stat_is_protocol_error() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER a\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS b\r\n")
            .read(b"+OK\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK lots\r\n")
            .build();

        let client = Client::from_stream(Pop3Stream::new(mock)).await.unwrap();
        let mut client = client.login("a", "b").await.unwrap();
        let err = expect_err(client.stat().await);
        assert!(matches!(err, Error::Protocol(_)));
    }
}
