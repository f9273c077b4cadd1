//! Integration tests for the IMAP client.
//!
//! A mock stream replays canned server output and records what the client
//! sends, so whole probe sessions run without a server.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailpoll_imap::{Client, Error};

/// Mock stream that returns predefined responses.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.responses.position()).unwrap();
        let data = self.responses.get_ref();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let to_read = (data.len() - pos).min(buf.remaining());
        buf.put_slice(&data[pos..pos + to_read]);
        self.responses.set_position((pos + to_read) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(sent.lock().unwrap().clone()).unwrap()
}

#[tokio::test]
async fn full_read_only_session() {
    let (stream, sent) = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] Dovecot ready.\r\n\
          A0000 OK [CAPABILITY IMAP4rev1 IDLE] Logged in\r\n\
          * FLAGS (\\Answered \\Seen)\r\n\
          * 3 EXISTS\r\n\
          * 0 RECENT\r\n\
          A0001 OK [READ-ONLY] Examine completed\r\n\
          * SEARCH 1 2 3\r\n\
          A0002 OK Search completed\r\n\
          * BYE Logging out\r\n\
          A0003 OK Logout completed\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    let client = client.login("alice@example.com", "secret").await.unwrap();

    let (mut client, status) = client.examine("INBOX").await.unwrap();
    assert_eq!(status.exists, 3);
    assert!(status.read_only);

    let ids = client.search("ALL").await.unwrap();
    assert_eq!(ids, vec![1, 2, 3]);

    client.logout().await.unwrap();

    assert_eq!(
        sent_text(&sent),
        "A0000 LOGIN alice@example.com secret\r\n\
         A0001 EXAMINE INBOX\r\n\
         A0002 SEARCH ALL\r\n\
         A0003 LOGOUT\r\n"
    );
}

#[tokio::test]
async fn login_rejection_is_auth_error() {
    let (stream, _sent) = MockStream::new(
        b"* OK ready\r\n\
          A0000 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("alice", "wrong").await.err().unwrap();
    assert!(matches!(err, Error::Auth(text) if text == "Authentication failed."));
}

#[tokio::test]
async fn examine_failure_is_reported() {
    let (stream, _sent) = MockStream::new(
        b"* OK ready\r\n\
          A0000 OK Logged in\r\n\
          A0001 NO Mailbox doesn't exist: INBOX\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    let client = client.login("alice", "secret").await.unwrap();
    let err = client.examine("INBOX").await.err().unwrap();
    assert!(err.is_refusal());
    assert!(matches!(err, Error::No(_)));
}

#[tokio::test]
async fn non_ascii_password_waits_for_continuation() {
    let (stream, sent) = MockStream::new(
        "* OK ready\r\n\
         + Ready for literal data\r\n\
         A0000 OK Logged in\r\n"
            .as_bytes(),
    );

    let client = Client::from_stream(stream).await.unwrap();
    client.login("bob", "pässword").await.unwrap();

    assert_eq!(sent_text(&sent), "A0000 LOGIN bob {9}\r\npässword\r\n");
}

#[tokio::test]
async fn literal_refused_before_continuation() {
    let (stream, sent) = MockStream::new(
        b"* OK ready\r\n\
          A0000 NO Literal too big\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("bob", "pässword").await.err().unwrap();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(sent_text(&sent), "A0000 LOGIN bob {9}\r\n");
}

#[tokio::test]
async fn bye_greeting_is_an_error() {
    let (stream, _sent) = MockStream::new(b"* BYE Too many connections\r\n");
    let err = Client::from_stream(stream).await.err().unwrap();
    assert!(matches!(err, Error::Bye(text) if text == "Too many connections"));
}

#[tokio::test]
async fn closed_connection_is_an_error() {
    let (stream, _sent) = MockStream::new(b"* OK ready\r\n");
    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("alice", "secret").await.err().unwrap();
    assert!(matches!(err, Error::Io(_)));
}
