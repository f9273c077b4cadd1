//! Line framing for IMAP responses.
//!
//! A response is one CRLF-terminated line, extended by any literals it
//! announces (`{n}\r\n` followed by `n` raw octets and the rest of the line).

#![allow(clippy::missing_errors_doc)]

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Longest line accepted, CRLF included.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Largest literal accepted. Probe sessions never fetch message bodies.
const MAX_LITERAL_SIZE: usize = 1024 * 1024;

/// Buffered IMAP connection.
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        loop {
            let line_start = response.len();
            self.read_line_into(&mut response).await?;

            let Some(size) = literal_size(&response[line_start..]) else {
                return Ok(response);
            };
            if size > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {size} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let literal_start = response.len();
            response.resize(literal_start + size, 0);
            self.reader.read_exact(&mut response[literal_start..]).await?;
        }
    }

    /// Reads responses up to and including the tagged completion for `tag`.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = is_tagged(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Writes one command chunk and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_line_into(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        let read = (&mut self.reader)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', buf)
            .await?;

        if buf.ends_with(b"\n") {
            Ok(())
        } else if read == MAX_LINE_LENGTH {
            Err(Error::Protocol("line too long".to_string()))
        } else {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )))
        }
    }
}

fn is_tagged(response: &[u8], tag: &str) -> bool {
    response
        .strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

/// Size announced at the end of a line: `{123}\r\n`, or `{123+}\r\n` for a
/// non-synchronizing literal.
fn literal_size(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n"))?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
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

    #[test]
    fn literal_sizes() {
        assert_eq!(literal_size(b"BODY {123}\r\n"), Some(123));
        assert_eq!(literal_size(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(literal_size(b"{0}\r\n"), Some(0));
        assert_eq!(literal_size(b"no literal\r\n"), None);
        assert_eq!(literal_size(b"incomplete {123"), None);
        assert_eq!(literal_size(b"wrong {abc}\r\n"), None);
        assert_eq!(literal_size(b"empty {}\r\n"), None);
    }

    #[test]
    fn tag_matching_needs_a_space() {
        assert!(is_tagged(b"A0000 OK done\r\n", "A0000"));
        assert!(!is_tagged(b"A00001 OK other\r\n", "A0000"));
        assert!(!is_tagged(b"* OK untagged\r\n", "A0000"));
    }

    #[tokio::test]
    async fn reads_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn reads_line_split_between_cr_and_lf() {
        let mock = Builder::new()
            .read(b"* OK ready\r")
            .read(b"\n* 3 EXISTS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"* 3 EXISTS\r\n");
    }

    #[tokio::test]
    async fn reads_embedded_literal() {
        let mock = Builder::new()
            .read(b"* LIST () \"/\" {5}\r\n")
            .read(b"INBOX\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* LIST () \"/\" {5}\r\nINBOX\r\n"
        );
    }

    #[tokio::test]
    async fn rejects_oversized_literal() {
        let header = format!("* 1 FETCH (BODY {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn rejects_overlong_line() {
        let line = vec![b'x'; MAX_LINE_LENGTH];
        let mock = Builder::new().read(&line).build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn eof_mid_line_is_an_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(
            framed.read_response().await,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[tokio::test]
    async fn writes_command() {
        let mock = Builder::new().write(b"A0000 LOGOUT\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_command(b"A0000 LOGOUT\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn collects_until_tagged() {
        let mock = Builder::new()
            .read(b"* 2 EXISTS\r\n")
            .read(b"A00001 OK not ours\r\n")
            .read(b"A0000 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let responses = framed.read_until_tagged("A0000").await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0000 OK done\r\n");
    }
}
