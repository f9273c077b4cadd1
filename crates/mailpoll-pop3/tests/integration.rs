//! Integration tests for the POP3 client against a replayed server.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailpoll_pop3::{Client, Error, Pop3Stream};

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

#[tokio::test]
async fn probe_session_sends_expected_commands() {
    let (stream, sent) = MockStream::new(
        b"+OK POP3 ready <1896.697170952@example.com>\r\n\
          +OK\r\n\
          +OK maildrop locked\r\n\
          +OK 5 12345\r\n\
          +OK bye\r\n",
    );

    let client = Client::from_stream(Pop3Stream::new(stream)).await.unwrap();
    let mut client = client.login("bob@example.com", "pa ss").await.unwrap();
    let stat = client.stat().await.unwrap();
    assert_eq!((stat.count, stat.size), (5, 12345));
    client.quit().await.unwrap();

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert_eq!(
        sent,
        "USER bob@example.com\r\nPASS pa ss\r\nSTAT\r\nQUIT\r\n"
    );
}

#[tokio::test]
async fn unknown_user_is_auth_error() {
    let (stream, sent) = MockStream::new(b"+OK ready\r\n-ERR no such user\r\n");

    let client = Client::from_stream(Pop3Stream::new(stream)).await.unwrap();
    let err = client.login("nobody", "x").await.err().unwrap();
    assert!(matches!(err, Error::Auth(_)));

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert_eq!(sent, "USER nobody\r\n");
}

#[tokio::test]
async fn server_hangup_mid_session() {
    let (stream, _sent) = MockStream::new(b"+OK ready\r\n+OK\r\n");

    let client = Client::from_stream(Pop3Stream::new(stream)).await.unwrap();
    let err = client.login("alice", "secret").await.err().unwrap();
    assert!(matches!(err, Error::ConnectionClosed));
}

#[tokio::test]
async fn password_with_line_break_is_never_sent() {
    let (stream, sent) = MockStream::new(b"+OK ready\r\n+OK\r\n");

    let client = Client::from_stream(Pop3Stream::new(stream)).await.unwrap();
    let err = client.login("alice", "x\r\nDELE 1").await.err().unwrap();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert_eq!(sent, "USER alice\r\n");
}
