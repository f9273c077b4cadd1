//! Type-state LMTP client.

use super::{LmtpStream, ServerInfo};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, Extension, Reply, ReplyCode};
use std::collections::HashSet;
use std::marker::PhantomData;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Type-state marker for connected state (greeting read).
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for the state after a successful LHLO.
#[derive(Debug)]
pub struct Ready;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for the single recipient being accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// LMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: LmtpStream<S>,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State> {
    /// Returns the server name and LHLO capabilities.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(mut stream: LmtpStream<S>) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        if !greeting.is_success() {
            return Err(Error::lmtp_error(
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }

        // First word of the greeting text is the server hostname
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            _state: PhantomData,
        })
    }

    /// Sends LHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the LHLO command fails.
    pub async fn lhlo(mut self, client_hostname: &str) -> Result<Client<S, Ready>> {
        let cmd = Command::Lhlo {
            hostname: client_hostname.to_string(),
        };
        let reply = self.send_command(&cmd).await?;
        expect_success(&reply)?;

        // First line repeats the server name, the rest are extensions
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();

        Ok(self.transition())
    }
}

impl<S> Client<S, Ready>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a mail transaction.
    ///
    /// `None` sends the null reverse-path `<>`. `BODY=8BITMIME` is added when
    /// the server advertised it, since fetched messages are passed through
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(mut self, from: Option<Address>) -> Result<Client<S, MailTransaction>> {
        let body = self
            .server_info
            .supports_8bitmime()
            .then(|| "8BITMIME".to_string());
        let reply = self.send_command(&Command::MailFrom { from, body }).await?;
        expect_success(&reply)?;
        Ok(self.transition())
    }
}

impl<S> Client<S, MailTransaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Names the transaction's only recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<S, RecipientAdded>> {
        let reply = self.send_command(&Command::RcptTo { to }).await?;
        expect_success(&reply)?;
        Ok(self.transition())
    }
}

impl<S> Client<S, RecipientAdded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<S, Data>> {
        let reply = self.send_command(&Command::Data).await?;

        if reply.code != ReplyCode::START_DATA {
            return Err(Error::lmtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(self.transition())
    }
}

impl<S> Client<S, Data>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends the message content and completes the transaction.
    ///
    /// LMTP answers the end of DATA once per accepted recipient; with a
    /// single recipient that is exactly one reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds an advertised SIZE limit,
    /// sending fails, or the recipient's final reply is not a success.
    pub async fn send_message(mut self, message: &[u8]) -> Result<(Client<S, Ready>, Reply)> {
        if let Some(limit) = self.server_info.max_message_size()
            && limit > 0
            && message.len() > limit
        {
            return Err(Error::Protocol(format!(
                "message of {} bytes exceeds the server limit of {limit} bytes",
                message.len()
            )));
        }
        self.stream.write_all(&encode_data(message)).await?;

        let reply = read_reply(&mut self.stream).await?;
        expect_success(&reply)?;

        debug!(code = %reply.code, "message accepted");
        Ok((self.transition(), reply))
    }
}

// Common implementation for all states
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;

        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::lmtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(())
    }
}

async fn read_reply<S>(stream: &mut LmtpStream<S>) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

fn expect_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(Error::lmtp_error(reply.code.as_u16(), reply.message_text()))
    }
}

/// Encodes a raw message for the DATA phase.
///
/// Line endings are normalized to CRLF, lines starting with `.` are
/// dot-stuffed, and the terminating `.` line is appended.
#[must_use]
pub fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 32 + 5);

    let body = message.strip_suffix(b"\n").unwrap_or(message);
    if !message.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn expect_err<T>(result: Result<T>) -> Error {
        match result {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        }
    }

    #[test]
    fn encode_normalizes_line_endings() {
        assert_eq!(encode_data(b"a\nb\r\n"), b"a\r\nb\r\n.\r\n");
    }

    #[test]
    fn encode_dot_stuffs() {
        assert_eq!(encode_data(b".hidden\r\n..\r\n"), b"..hidden\r\n...\r\n.\r\n");
    }

    #[test]
    fn encode_without_trailing_newline() {
        assert_eq!(encode_data(b"last line"), b"last line\r\n.\r\n");
    }

    #[test]
    fn encode_empty_message() {
        assert_eq!(encode_data(b""), b".\r\n");
    }

    #[tokio::test]
    async fn full_delivery_session() {
        let mock = Builder::new()
            .read(b"220 dovecot ready.\r\n")
            .write(b"LHLO mailpoll.localhost\r\n")
            .read(b"250-dovecot\r\n250-8BITMIME\r\n250-ENHANCEDSTATUSCODES\r\n250 PIPELINING\r\n")
            .write(b"MAIL FROM:<getmail-fetcher@localhost> BODY=8BITMIME\r\n")
            .read(b"250 2.1.0 OK\r\n")
            .write(b"RCPT TO:<alice@local>\r\n")
            .read(b"250 2.1.5 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 OK\r\n")
            .write(b"Subject: hi\r\n\r\nhello\r\n.\r\n")
            .read(b"250 2.0.0 <alice@local> Saved\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 2.0.0 Bye\r\n")
            .build();

        let client = Client::from_stream(LmtpStream::new(mock)).await.unwrap();
        assert_eq!(client.server_info().hostname, "dovecot");
        let client = client.lhlo("mailpoll.localhost").await.unwrap();
        assert!(client.server_info().supports_8bitmime());

        let client = client
            .mail_from(Some(Address::new("getmail-fetcher@localhost").unwrap()))
            .await
            .unwrap();
        let client = client
            .rcpt_to(Address::new("alice@local").unwrap())
            .await
            .unwrap();
        let client = client.data().await.unwrap();
        let (client, reply) = client
            .send_message(b"Subject: hi\n\nhello\n")
            .await
            .unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_recipient_is_an_error() {
        let mock = Builder::new()
            .read(b"220 dovecot ready.\r\n")
            .write(b"LHLO mailpoll.localhost\r\n")
            .read(b"250 dovecot\r\n")
            .write(b"MAIL FROM:<>\r\n")
            .read(b"250 2.1.0 OK\r\n")
            .write(b"RCPT TO:<nobody@local>\r\n")
            .read(b"550 5.1.1 <nobody@local> User doesn't exist\r\n")
            .build();

        let client = Client::from_stream(LmtpStream::new(mock)).await.unwrap();
        let client = client.lhlo("mailpoll.localhost").await.unwrap();
        let client = client.mail_from(None).await.unwrap();
        let err = expect_err(client.rcpt_to(Address::new("nobody@local").unwrap()).await);
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn failed_final_reply_is_reported() {
        let mock = Builder::new()
            .read(b"220 dovecot ready.\r\n")
            .write(b"LHLO h\r\n")
            .read(b"250 dovecot\r\n")
            .write(b"MAIL FROM:<>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<b@local>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 OK\r\n")
            .write(b"x\r\n.\r\n")
            .read(b"452 4.2.2 <b@local> Quota exceeded\r\n")
            .build();

        let client = Client::from_stream(LmtpStream::new(mock)).await.unwrap();
        let client = client.lhlo("h").await.unwrap();
        let client = client.mail_from(None).await.unwrap();
        let client = client.rcpt_to(Address::new("b@local").unwrap()).await.unwrap();
        let client = client.data().await.unwrap();
        let err = expect_err(client.send_message(b"x").await);
        assert!(err.is_transient());
        assert!(err.to_string().contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn oversized_message_is_not_sent() {
        let mock = Builder::new()
            .read(b"220 dovecot ready.\r\n")
            .write(b"LHLO h\r\n")
            .read(b"250-dovecot\r\n250 SIZE 16\r\n")
            .write(b"MAIL FROM:<>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<a@local>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 OK\r\n")
            .build();

        let client = Client::from_stream(LmtpStream::new(mock)).await.unwrap();
        let client = client.lhlo("h").await.unwrap();
        assert_eq!(client.server_info().max_message_size(), Some(16));
        let client = client.mail_from(None).await.unwrap();
        let client = client.rcpt_to(Address::new("a@local").unwrap()).await.unwrap();
        let client = client.data().await.unwrap();
        let err = expect_err(client.send_message(&[b'x'; 17]).await);
        assert!(err.to_string().contains("exceeds the server limit of 16 bytes"));
    }

    #[tokio::test]
    async fn greeting_rejection() {
        let mock = Builder::new()
            .read(b"421 4.3.2 Shutting down\r\n")
            .build();
        let err = expect_err(Client::from_stream(LmtpStream::new(mock)).await);
        assert!(err.is_transient());
    }
}
