//! Framed I/O for the SMTP protocol.
//!
//! Replies arrive as CRLF-terminated lines; commands and message data are
//! written as raw bytes. Every read and write is bounded by the I/O timeout.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::command::Command;
use crate::parser::parse_line;
use crate::types::{Reply, ReplyCode};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum reply line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 4096;

/// A complete reply together with a flag telling whether every line
/// carried the same code.
#[derive(Debug)]
pub(crate) struct ReplyLines {
    pub(crate) reply: Reply,
    pub(crate) consistent: bool,
}

/// Framed connection for SMTP.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    io_timeout: Duration,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            io_timeout,
        }
    }

    /// Reads one reply, consuming all continuation lines.
    ///
    /// Continuation lines with a different code than the first line are a
    /// syntax error, reported after the whole reply has been consumed.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let lines = self.read_reply_lines().await?;
        if lines.consistent {
            Ok(lines.reply)
        } else {
            Err(Error::ReplySyntax(lines.reply.message_text()))
        }
    }

    /// Reads one reply and reports mismatched continuation codes instead of
    /// failing on them.
    pub(crate) async fn read_reply_lines(&mut self) -> Result<ReplyLines> {
        let first = self.read_line().await?;
        let parsed = parse_line(&first)?;
        let code = parsed.code;
        let mut last = parsed.last;
        let mut consistent = true;
        let mut lines = vec![parsed.text.to_string()];

        while !last {
            let line = self.read_line().await?;
            let parsed = parse_line(&line)?;
            consistent &= parsed.code == code;
            last = parsed.last;
            lines.push(parsed.text.to_string());
        }

        Ok(ReplyLines {
            reply: Reply::new(code, lines),
            consistent,
        })
    }

    /// Reads a single line and strips its terminator.
    async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();

        loop {
            let buf = match tokio::time::timeout(self.io_timeout, self.reader.fill_buf()).await {
                Ok(result) => result?,
                Err(_) => return Err(Error::Timeout),
            };
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::ReplySyntax(format!(
                    "line longer than {MAX_LINE_LENGTH} bytes"
                )));
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let line = String::from_utf8_lossy(&line).into_owned();
        tracing::trace!(%line, "S:");
        Ok(line)
    }

    /// Writes a command to the stream.
    pub async fn write_command(&mut self, command: &Command) -> Result<()> {
        let data = command.serialize();
        tracing::trace!(command = %String::from_utf8_lossy(data.trim_ascii_end()), "C:");
        self.write_raw(&data).await
    }

    /// Writes raw data to the stream.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let io_timeout = self.io_timeout;
        let stream = self.reader.get_mut();
        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        match tokio::time::timeout(io_timeout, write).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Sends a command and reads its reply.
    pub async fn command(&mut self, command: &Command) -> Result<Reply> {
        self.write_command(command).await?;
        self.read_reply().await
    }

    /// Shuts the write side down, ignoring errors.
    pub async fn shutdown(&mut self) {
        let io_timeout = self.io_timeout;
        let _ = tokio::time::timeout(io_timeout, self.reader.get_mut().shutdown()).await;
    }

    /// Returns true if the server sent data that has not been read yet.
    pub fn has_buffered_data(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// Returns the I/O timeout.
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl ReplyLines {
    /// Returns true for a well-formed reply with the expected code.
    pub(crate) fn is(&self, code: ReplyCode) -> bool {
        self.consistent && self.reply.code == code
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    mod reply_tests {
        use super::*;

        #[tokio::test]
        async fn single_line() {
            let mock = Builder::new().read(b"250 OK\r\n").build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            let reply = framed.read_reply().await.unwrap();
            assert_eq!(reply.code, ReplyCode::OK);
            assert_eq!(reply.lines, vec!["OK"]);
        }

        #[tokio::test]
        async fn multi_line_split_across_reads() {
            let mock = Builder::new()
                .read(b"250-mx.example.org\r\n250-PIPE")
                .read(b"LINING\r\n250 CHUNKING\r\n")
                .build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            let reply = framed.read_reply().await.unwrap();
            assert_eq!(reply.lines, vec!["mx.example.org", "PIPELINING", "CHUNKING"]);
        }

        #[tokio::test]
        async fn bare_lf_terminator() {
            let mock = Builder::new().read(b"354 go ahead\n").build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            let reply = framed.read_reply().await.unwrap();
            assert_eq!(reply.code, ReplyCode::START_DATA);
            assert_eq!(reply.text(), "go ahead");
        }

        #[tokio::test]
        async fn mismatched_codes_consume_whole_reply() {
            let mock = Builder::new()
                .read(b"250-one\r\n251 two\r\n221 bye\r\n")
                .build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            assert!(matches!(framed.read_reply().await, Err(Error::ReplySyntax(_))));
            let next = framed.read_reply().await.unwrap();
            assert_eq!(next.code, ReplyCode::CLOSING);
        }

        #[tokio::test]
        async fn inconsistent_lines_are_flagged() {
            let mock = Builder::new().read(b"220-hi\r\n250 there\r\n").build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            let lines = framed.read_reply_lines().await.unwrap();
            assert!(!lines.consistent);
            assert!(!lines.is(ReplyCode::SERVICE_READY));
        }

        #[tokio::test]
        async fn invalid_line() {
            let mock = Builder::new().read(b"hello world\r\n").build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            assert!(matches!(framed.read_reply().await, Err(Error::ReplySyntax(_))));
        }

        #[tokio::test]
        async fn eof_is_unexpected() {
            let mock = Builder::new().read(b"250-partial\r\n").build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            let err = framed.read_reply().await.unwrap_err();
            assert!(matches!(&err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
            assert!(err.is_per_host());
        }

        #[tokio::test]
        async fn read_error_is_reported() {
            let mock = Builder::new()
                .read_error(io::Error::from(io::ErrorKind::ConnectionReset))
                .build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            let err = framed.read_reply().await.unwrap_err();
            assert_eq!(
                err.diagnostic().to_string(),
                "Z4.4.1 connection to remote server died"
            );
        }

        #[tokio::test]
        async fn overlong_line() {
            let long = vec![b'a'; MAX_LINE_LENGTH + 10];
            let mock = Builder::new().read(b"250 ").read(&long).build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            assert!(matches!(framed.read_reply().await, Err(Error::ReplySyntax(_))));
        }

        #[tokio::test(start_paused = true)]
        async fn silent_server_times_out() {
            let mock = Builder::new().wait(Duration::from_secs(60)).build();
            let mut framed = FramedStream::new(mock, Duration::from_secs(1));
            assert!(matches!(framed.read_reply().await, Err(Error::Timeout)));
        }
    }

    mod write_tests {
        use super::*;

        #[tokio::test]
        async fn command_round_trip() {
            let mock = Builder::new()
                .write(b"DATA\r\n")
                .read(b"354 Start mail input\r\n")
                .build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            let reply = framed.command(&Command::Data).await.unwrap();
            assert!(reply.code.is_intermediate());
        }

        #[tokio::test]
        async fn raw_data() {
            let mock = Builder::new().write(b"Subject: x\r\n\r\nbody\r\n").build();
            let mut framed = FramedStream::new(mock, TIMEOUT);
            framed.write_raw(b"Subject: x\r\n\r\nbody\r\n").await.unwrap();
        }
    }
}
