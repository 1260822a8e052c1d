//! Delivery driver: envelope, message transfer and the final verdict.

use std::io;

use bytes::Bytes;
use mxsend_mime::{BodyMode, BodySink, Discard, Options, encode_body, need_recode};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::command::{BodyType, Command};
use crate::connection::{Client, Config};
use crate::error::{Diagnostic, Error, Result, Stage};
use crate::types::{Address, Reply, ReplyCode};

/// Size of one BDAT chunk.
pub const BDAT_CHUNK_SIZE: usize = 15000;

/// Encoded chunks in flight between the encoder and the socket.
const WIRE_QUEUE_DEPTH: usize = 4;

/// Sender and recipients of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path, possibly null.
    pub sender: Address,
    /// Forward paths.
    pub recipients: Vec<Address>,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(sender: Address, recipients: Vec<Address>) -> Self {
        Self { sender, recipients }
    }

    /// Checks that the envelope can start a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] when there are no recipients.
    pub fn validate(&self) -> Result<()> {
        if self.recipients.is_empty() {
            return Err(Error::InvalidAddress("envelope has no recipients".to_string()));
        }
        Ok(())
    }
}

/// How the message body went over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// DATA with line endings and dots fixed up only.
    Plain,
    /// DATA with Quoted-Printable recoding.
    Recoded,
    /// BDAT chunks, unmodified.
    Chunked,
}

impl TransferMode {
    /// Word used in the success line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Recoded => "qp recoded ",
            Self::Chunked => "chunked ",
        }
    }
}

impl From<BodyMode> for TransferMode {
    fn from(mode: BodyMode) -> Self {
        match mode {
            BodyMode::Plain => Self::Plain,
            BodyMode::Recoded => Self::Recoded,
        }
    }
}

/// Verdict of the server on one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientStatus {
    /// Recipient accepted.
    Accepted,
    /// Recipient refused with this reply.
    Rejected(Reply),
}

/// A message accepted by the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Host that took the message.
    pub host: String,
    /// Transfer mode used.
    pub mode: TransferMode,
    /// Final reply.
    pub reply: Reply,
    /// Per-recipient results.
    pub recipients: Vec<(Address, RecipientStatus)>,
}

impl Outcome {
    /// Returns the `K` line for the queue manager.
    #[must_use]
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::success(format!(
            "{} accepted {}message./Remote host said: {}",
            self.host,
            self.mode.label(),
            self.reply
        ))
    }

    /// Returns the recipients the server refused.
    pub fn rejected(&self) -> impl Iterator<Item = (&Address, &Reply)> {
        self.recipients.iter().filter_map(|(rcpt, status)| match status {
            RecipientStatus::Accepted => None,
            RecipientStatus::Rejected(reply) => Some((rcpt, reply)),
        })
    }
}

/// Runs one mail transaction on a negotiated session.
///
/// The session is left open; the caller sends QUIT.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] before MAIL if the envelope has no
/// recipients, [`Error::MessageTooLarge`] before MAIL if the server's SIZE
/// limit is exceeded, [`Error::Rejected`] for refused envelope, DATA, BDAT or
/// final replies, and transport or local-data errors as they occur.
pub async fn deliver<S>(
    client: &mut Client<S>,
    envelope: &Envelope,
    message: &Bytes,
    config: &Config,
) -> Result<Outcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    envelope.validate()?;
    let extensions = *client.extensions();
    if let Some(limit) = extensions.max_size()
        && message.len() > limit
    {
        return Err(Error::MessageTooLarge {
            size: message.len(),
            limit,
        });
    }

    let body = (extensions.eight_bit_mime() && need_recode(message).has_8bit())
        .then_some(BodyType::EightBitMime);
    let reply = client
        .command(&Command::MailFrom {
            from: envelope.sender.clone(),
            size: extensions.size().then_some(message.len()),
            body,
        })
        .await?;
    if !reply.is_success() {
        return Err(Error::Rejected {
            stage: Stage::MailFrom,
            reply,
        });
    }

    let recipients = send_recipients(client, envelope).await?;

    let (mode, reply) = if config.chunking && extensions.chunking() {
        (TransferMode::Chunked, send_bdat(client, message).await?)
    } else {
        send_data(client, message, config).await?
    };

    tracing::info!(host = %client.host(), mode = ?mode, reply = %reply, "Message accepted");
    Ok(Outcome {
        host: client.host().to_string(),
        mode,
        reply,
        recipients,
    })
}

async fn send_recipients<S>(
    client: &mut Client<S>,
    envelope: &Envelope,
) -> Result<Vec<(Address, RecipientStatus)>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut statuses = Vec::with_capacity(envelope.recipients.len());
    let mut last_rejection = None;

    for rcpt in &envelope.recipients {
        let reply = client
            .command(&Command::RcptTo { to: rcpt.clone() })
            .await?;
        if reply.is_success() {
            statuses.push((rcpt.clone(), RecipientStatus::Accepted));
        } else {
            tracing::warn!(recipient = %rcpt, reply = %reply, "Recipient rejected");
            last_rejection = Some(reply.clone());
            statuses.push((rcpt.clone(), RecipientStatus::Rejected(reply)));
        }
    }

    let accepted = statuses
        .iter()
        .any(|(_, status)| *status == RecipientStatus::Accepted);
    match last_rejection {
        Some(reply) if !accepted => Err(Error::Rejected {
            stage: Stage::RcptTo,
            reply,
        }),
        _ => Ok(statuses),
    }
}

/// Sends the message with DATA.
///
/// The body is encoded twice. A first pass into [`Discard`] reports a
/// malformed message before DATA is issued. The second pass runs on the
/// blocking pool and its output goes to the socket one buffer at a time.
async fn send_data<S>(
    client: &mut Client<S>,
    message: &Bytes,
    config: &Config,
) -> Result<(TransferMode, Reply)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let eight_bit_mime = client.extensions().eight_bit_mime();
    let options = Options {
        eight_bit_mime,
        helo_name: &config.helo_name,
        agent: &config.agent,
    };
    let mut counter = Discard::default();
    let checked = encode_body(message, &options, &mut counter)?;
    tracing::debug!(mode = ?checked.mode, size = counter.written(), "Message encoded");

    let reply = client.command(&Command::Data).await?;
    if reply.code != ReplyCode::START_DATA {
        return Err(Error::Rejected {
            stage: Stage::Data,
            reply,
        });
    }

    let (tx, mut rx) = mpsc::channel(WIRE_QUEUE_DEPTH);
    let message = message.clone();
    let helo_name = config.helo_name.clone();
    let agent = config.agent.clone();
    let encoder = tokio::task::spawn_blocking(move || {
        let options = Options {
            eight_bit_mime,
            helo_name: &helo_name,
            agent: &agent,
        };
        encode_body(&message, &options, &mut WireSink { tx, open: true })
    });

    while let Some(chunk) = rx.recv().await {
        client.send_raw(&chunk).await?;
    }
    let encoded = encoder.await.map_err(|e| Error::Io(io::Error::other(e)))??;

    client.send_raw(encoded.state.terminator()).await?;
    let reply = final_reply(client).await?;
    Ok((encoded.mode.into(), reply))
}

/// Hands encoder output to the task that owns the socket.
struct WireSink {
    tx: mpsc::Sender<Bytes>,
    open: bool,
}

impl BodySink for WireSink {
    fn write_chunk(&mut self, chunk: &[u8]) {
        // The receiver is gone once a socket write failed.
        if self.open && self.tx.blocking_send(Bytes::copy_from_slice(chunk)).is_err() {
            self.open = false;
        }
    }
}

/// Sends the message unmodified in [`BDAT_CHUNK_SIZE`] chunks.
async fn send_bdat<S>(client: &mut Client<S>, message: &[u8]) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut rest = message;
    while rest.len() > BDAT_CHUNK_SIZE {
        let (chunk, tail) = rest.split_at(BDAT_CHUNK_SIZE);
        client
            .write_command(&Command::Bdat {
                size: chunk.len(),
                last: false,
            })
            .await?;
        client.send_raw(chunk).await?;
        let reply = client.read_reply().await?;
        if reply.code != ReplyCode::OK {
            return Err(Error::Rejected {
                stage: Stage::Bdat,
                reply,
            });
        }
        rest = tail;
    }

    client
        .write_command(&Command::Bdat {
            size: rest.len(),
            last: true,
        })
        .await?;
    client.send_raw(rest).await?;
    final_reply(client).await
}

async fn final_reply<S>(client: &mut Client<S>) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reply = client.read_reply().await?;
    if reply.is_success() {
        Ok(reply)
    } else {
        Err(Error::Rejected {
            stage: Stage::Final,
            reply,
        })
    }
}
