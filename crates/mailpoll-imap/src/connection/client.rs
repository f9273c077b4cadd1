//! Type-state IMAP client connection.
//!
//! - `NotAuthenticated`: initial state after the greeting
//! - `Authenticated`: after a successful LOGIN
//! - `Selected`: after a successful EXAMINE
//!
//! Each state only exposes the commands that are valid in it.

#![allow(clippy::missing_errors_doc)]

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{MailboxStatus, SeqNum, Status};
use crate::{Error, Result};

/// Initial state: greeting received, not logged in.
#[derive(Debug, Clone, Copy)]
pub struct NotAuthenticated;

/// Logged in, no mailbox open.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated;

/// A mailbox is open.
#[derive(Debug, Clone, Copy)]
pub struct Selected;

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tag_gen: TagGenerator,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends LOGOUT and drops the connection.
    ///
    /// The server's answer is read but not checked.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        for chunk in Command::Logout.serialize(&tag) {
            self.stream.write_command(&chunk).await?;
        }
        let _ = self.stream.read_until_tagged(&tag).await;
        Ok(())
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            _state: PhantomData,
        }
    }

    /// Sends a command, waiting for continuations between literal chunks,
    /// and returns every response up to a successful tagged completion.
    async fn execute(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let tag = self.tag_gen.next();
        let chunks = command.serialize(&tag);
        debug!(tag = %tag, command = command.name(), "IMAP command");

        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            self.stream.write_command(chunk).await?;
            if i < last {
                self.await_continuation(&tag).await?;
            }
        }

        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    async fn await_continuation(&mut self, tag: &str) -> Result<()> {
        loop {
            let raw = self.stream.read_response().await?;
            match ResponseParser::parse(&raw)? {
                Response::Continuation(_) => return Ok(()),
                Response::Tagged {
                    tag: ref resp_tag, ..
                } if resp_tag == tag => {
                    check_tagged_ok(&[raw], tag)?;
                    return Err(Error::Protocol(
                        "command completed before literal was sent".to_string(),
                    ));
                }
                Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                    return Err(Error::Bye(text));
                }
                _ => {}
            }
        }
    }
}

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and reads the greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.read_response().await?;

        match ResponseParser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Ok { .. } | UntaggedResponse::PreAuth { .. }) => {}
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                return Err(Error::Bye(text));
            }
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            _state: PhantomData,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// A NO answer becomes [`Error::Auth`].
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.execute(&command).await.map_err(|e| match e {
            Error::No(text) => Error::Auth(text),
            other => other,
        })?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens `mailbox` read-only with EXAMINE.
    pub async fn examine(mut self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        let command = Command::Examine {
            mailbox: mailbox.to_string(),
        };
        let responses = self.execute(&command).await?;

        let mut status = MailboxStatus::default();
        for raw in &responses {
            match ResponseParser::parse(raw) {
                Ok(Response::Untagged(UntaggedResponse::Exists(n))) => status.exists = n,
                Ok(Response::Tagged {
                    code: Some(code), ..
                }) if code.eq_ignore_ascii_case("READ-ONLY") => status.read_only = true,
                _ => {}
            }
        }

        Ok((self.transition(), status))
    }
}

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs SEARCH with the given criteria and returns matching sequence numbers.
    pub async fn search(&mut self, criteria: &str) -> Result<Vec<SeqNum>> {
        let command = Command::Search {
            criteria: criteria.to_string(),
        };
        let responses = self.execute(&command).await?;

        let mut ids = Vec::new();
        for raw in &responses {
            if let Response::Untagged(UntaggedResponse::Search(found)) = ResponseParser::parse(raw)?
            {
                ids.extend(found);
            }
        }
        Ok(ids)
    }
}

/// Checks that the tagged completion for `tag` is OK.
fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
    for raw in responses.iter().rev() {
        if let Ok(Response::Tagged {
            tag: resp_tag,
            status,
            text,
            ..
        }) = ResponseParser::parse(raw)
            && resp_tag == tag
        {
            return match status {
                Status::Ok | Status::PreAuth => Ok(()),
                Status::No => Err(Error::No(text)),
                Status::Bad => Err(Error::Bad(text)),
                Status::Bye => Err(Error::Bye(text)),
            };
        }
    }

    Err(Error::Protocol("missing tagged response".to_string()))
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

    #[test]
    fn tagged_status_mapping() {
        let ok = vec![b"A0000 OK done\r\n".to_vec()];
        assert!(check_tagged_ok(&ok, "A0000").is_ok());

        let no = vec![b"* 1 EXISTS\r\n".to_vec(), b"A0001 NO nope\r\n".to_vec()];
        assert!(matches!(check_tagged_ok(&no, "A0001"), Err(Error::No(t)) if t == "nope"));

        let bad = vec![b"A0002 BAD syntax\r\n".to_vec()];
        assert!(matches!(check_tagged_ok(&bad, "A0002"), Err(Error::Bad(_))));

        assert!(matches!(
            check_tagged_ok(&ok, "A0009"),
            Err(Error::Protocol(_))
        ));
    }
}
