//! SMTP client session with one delivery host.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use super::framed::FramedStream;
use super::network::Network;
use crate::command::Command;
use crate::error::{Error, Result, Stage};
use crate::types::{ExtensionSet, Reply, ReplyCode};

/// SMTP client bound to one remote host.
pub struct Client<S> {
    stream: FramedStream<S>,
    host: String,
    extensions: ExtensionSet,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a freshly connected stream. Nothing is read yet.
    pub fn new(stream: S, host: impl Into<String>, io_timeout: Duration) -> Self {
        Self {
            stream: FramedStream::new(stream, io_timeout),
            host: host.into(),
            extensions: ExtensionSet::empty(),
        }
    }

    /// Returns the remote host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the negotiated extensions.
    #[must_use]
    pub const fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Reads the server greeting, which must be a consistent 220 reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedGreeting`] if continuation lines disagree on
    /// the code and [`Error::Rejected`] for any code other than 220.
    pub async fn read_greeting(&mut self) -> Result<Reply> {
        let lines = self.stream.read_reply_lines().await?;
        if !lines.consistent {
            tracing::warn!(host = %self.host, "invalid greeting");
            return Err(Error::MalformedGreeting {
                host: self.host.clone(),
            });
        }
        if !lines.is(ReplyCode::SERVICE_READY) {
            return Err(Error::Rejected {
                stage: Stage::Greeting,
                reply: lines.reply,
            });
        }
        Ok(lines.reply)
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// A permanent error reply to EHLO falls back to HELO, which leaves the
    /// extension set empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if neither greeting is accepted.
    pub async fn ehlo(&mut self, helo_name: &str) -> Result<&ExtensionSet> {
        let reply = self
            .stream
            .command(&Command::Ehlo {
                hostname: helo_name.to_string(),
            })
            .await?;

        if reply.code == ReplyCode::OK {
            self.extensions = ExtensionSet::from_ehlo(&reply);
            tracing::debug!(host = %self.host, extensions = self.extensions.bits(), "EHLO accepted");
            return Ok(&self.extensions);
        }
        if !reply.is_permanent_error() {
            return Err(Error::Rejected {
                stage: Stage::Ehlo,
                reply,
            });
        }

        tracing::debug!(host = %self.host, code = %reply.code, "EHLO refused, trying HELO");
        let reply = self
            .stream
            .command(&Command::Helo {
                hostname: helo_name.to_string(),
            })
            .await?;
        if reply.code != ReplyCode::OK {
            return Err(Error::Rejected {
                stage: Stage::Ehlo,
                reply,
            });
        }
        self.extensions = ExtensionSet::empty();
        Ok(&self.extensions)
    }

    /// Upgrades the session with STARTTLS and repeats EHLO over the
    /// encrypted channel, replacing the extension set.
    ///
    /// On failure the session is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsSetup`] if local TLS material is unusable,
    /// [`Error::Rejected`] if the server refuses STARTTLS, or
    /// [`Error::TlsHandshake`] if the handshake fails.
    pub async fn starttls<N>(mut self, network: &N, helo_name: &str) -> Result<Self>
    where
        N: Network<Stream = S>,
    {
        if let Err(e) = network.check_tls() {
            self.close_after(&e).await;
            return Err(e);
        }

        let reply = match self.stream.command(&Command::StartTls).await {
            Ok(reply) => reply,
            Err(e) => {
                self.close_after(&e).await;
                return Err(e);
            }
        };
        if reply.code != ReplyCode::SERVICE_READY {
            let e = Error::Rejected {
                stage: Stage::StartTls,
                reply,
            };
            self.close_after(&e).await;
            return Err(e);
        }
        if self.stream.has_buffered_data() {
            return Err(Error::TlsHandshake(
                "server sent data before the TLS handshake".to_string(),
            ));
        }

        let io_timeout = self.stream.io_timeout();
        let upgraded = network.upgrade(self.stream.into_inner(), &self.host).await?;
        tracing::debug!(host = %self.host, "TLS established");

        let mut client = Self::new(upgraded, self.host, io_timeout);
        if let Err(e) = client.ehlo(helo_name).await {
            client.close_after(&e).await;
            return Err(e);
        }
        Ok(client)
    }

    /// Sends a command and reads its reply.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an invalid reply.
    pub async fn command(&mut self, command: &Command) -> Result<Reply> {
        self.stream.command(command).await
    }

    /// Sends a command without waiting for the reply.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub async fn write_command(&mut self, command: &Command) -> Result<()> {
        self.stream.write_command(command).await
    }

    /// Writes message data.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_raw(data).await
    }

    /// Reads the next reply.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an invalid reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        self.stream.read_reply().await
    }

    /// Sends QUIT, reads the reply if one comes and shuts the socket down.
    pub async fn quit(mut self) {
        match self.stream.command(&Command::Quit).await {
            Ok(reply) => tracing::debug!(host = %self.host, %reply, "QUIT"),
            Err(e) => tracing::debug!(host = %self.host, error = %e, "QUIT failed"),
        }
        self.stream.shutdown().await;
    }

    /// Ends the session after `error`: QUIT if the connection still looks
    /// usable, otherwise just drop it.
    pub async fn close_after(self, error: &Error) {
        if !error.is_connection_lost() {
            self.quit().await;
        }
    }
}
