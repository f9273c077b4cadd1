//! Low-level LMTP stream handling.

use crate::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Line-oriented LMTP stream.
///
/// LMTP runs on a trusted local network, so the transport is plain TCP in
/// production; any `AsyncRead + AsyncWrite` works, which keeps the client
/// testable against scripted streams.
#[derive(Debug)]
pub struct LmtpStream<S> {
    reader: BufReader<S>,
}

impl<S> LmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Reads a line from the stream, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the peer closed the connection.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(line.trim_end().to_string())
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }
}

/// Connects to an LMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<LmtpStream<TcpStream>> {
    let addr = format!("{hostname}:{port}");
    let stream = TcpStream::connect(&addr).await?;
    Ok(LmtpStream::new(stream))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mock = Builder::new().read(b"220 dovecot ready\r\n").build();
        let mut stream = LmtpStream::new(mock);
        assert_eq!(stream.read_line().await.unwrap(), "220 dovecot ready");
    }

    #[tokio::test]
    async fn read_line_reports_eof() {
        let mock = Builder::new().build();
        let mut stream = LmtpStream::new(mock);
        assert!(matches!(
            stream.read_line().await,
            Err(Error::ConnectionClosed)
        ));
    }
}
