//! Error types for SMTP delivery.

use std::fmt;
use std::io;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol step at which the remote answered unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Initial 220 greeting.
    Greeting,
    /// EHLO or HELO.
    Ehlo,
    /// STARTTLS.
    StartTls,
    /// MAIL FROM.
    MailFrom,
    /// RCPT TO.
    RcptTo,
    /// DATA (waiting for 354).
    Data,
    /// A non-final BDAT chunk.
    Bdat,
    /// Reply to the end of the message.
    Final,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Greeting => "greeting",
            Self::Ehlo => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Bdat => "BDAT",
            Self::Final => "message",
        };
        f.write_str(name)
    }
}

/// SMTP delivery error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The TCP connection to a candidate could not be opened.
    #[error("connect failed: {0}")]
    Connect(io::Error),

    /// A read or write did not complete in time.
    #[error("connection timed out")]
    Timeout,

    /// Server sent a line that is not a valid reply.
    #[error("syntax error in server reply: {0:?}")]
    ReplySyntax(String),

    /// Greeting continuation lines disagree on the reply code.
    #[error("invalid greeting from {host}")]
    MalformedGreeting {
        /// Remote host.
        host: String,
    },

    /// TLS could not be set up locally (certificates, keys, roots).
    #[error("TLS initialization failed: {0}")]
    TlsSetup(String),

    /// TLS handshake with the remote failed.
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    /// Host publishes TLSA records but does not offer STARTTLS.
    #[error("{host} publishes TLSA records but does not offer STARTTLS")]
    DanePolicy {
        /// Remote host.
        host: String,
    },

    /// Server returned an unexpected reply.
    #[error("{stage} rejected: {reply}")]
    Rejected {
        /// Step that failed.
        stage: Stage,
        /// Reply from the server.
        reply: Reply,
    },

    /// Message exceeds the SIZE limit advertised by the server.
    #[error("message of {size} bytes exceeds size limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size.
        size: usize,
        /// Advertised limit.
        limit: usize,
    },

    /// The queued message itself is malformed.
    #[error(transparent)]
    Message(#[from] mxsend_mime::Error),

    /// Invalid envelope address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Resolver could not look up the destination.
    #[error("lookup of {domain} failed: {reason}")]
    Resolve {
        /// Destination domain.
        domain: String,
        /// Resolver message.
        reason: String,
    },

    /// Destination has no usable mail exchanger.
    #[error("no mail exchanger for {0}")]
    NoMailExchanger(String),

    /// Every candidate failed.
    #[error("no remote host accepted the connection")]
    Exhausted {
        /// Failure of the last host tried.
        last: Option<Box<Error>>,
    },
}

/// Returns true if the kind means the remote end is unreachable or gone.
#[must_use]
pub const fn is_remote_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
    )
}

impl Error {
    /// Returns true if only the current host is affected and the next
    /// candidate should be tried.
    #[must_use]
    pub fn is_per_host(&self) -> bool {
        match self {
            Self::Io(e) => is_remote_kind(e.kind()),
            Self::Connect(e) => e.kind() != io::ErrorKind::OutOfMemory,
            Self::Timeout
            | Self::ReplySyntax(_)
            | Self::MalformedGreeting { .. }
            | Self::TlsHandshake(_)
            | Self::DanePolicy { .. } => true,
            Self::Rejected { stage, .. } => {
                matches!(stage, Stage::Greeting | Stage::Ehlo | Stage::StartTls)
            }
            _ => false,
        }
    }

    /// Returns true if the connection can no longer carry a QUIT.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Connect(_) | Self::Timeout | Self::TlsHandshake(_)
        )
    }

    /// Returns true if this is a permanent error.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.diagnostic().class == DiagnosticClass::Permanent
    }

    /// Converts the error into the line reported to the queue manager.
    #[must_use]
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            Self::Io(e) | Self::Connect(e) => io_diagnostic(e),
            Self::Timeout => Diagnostic::temporary("4.4.1 connection to remote server timed out"),
            Self::ReplySyntax(_) | Self::MalformedGreeting { .. } => {
                Diagnostic::temporary("5.5.2 syntax error in server reply")
            }
            Self::TlsSetup(_) | Self::TlsHandshake(_) => {
                Diagnostic::temporary(format!("4.3.0 {self}"))
            }
            Self::DanePolicy { .. } => Diagnostic::temporary(format!("4.7.5 {self}")),
            Self::Rejected { stage, reply } => rejection(*stage, reply),
            Self::MessageTooLarge { .. } => {
                Diagnostic::permanent("5.3.4 message is too big for remote host")
            }
            Self::Message(e) => Diagnostic::permanent(format!("{} {e}", e.status())),
            Self::InvalidAddress(_) => Diagnostic::permanent(format!("5.1.7 {self}")),
            Self::Resolve { .. } => Diagnostic::temporary(format!("4.4.3 {self}")),
            Self::NoMailExchanger(_) => Diagnostic::permanent(format!("5.1.2 {self}")),
            Self::Exhausted { last: Some(last) } => last.diagnostic(),
            Self::Exhausted { last: None } => {
                Diagnostic::temporary("4.4.1 can't connect to any remote server")
            }
        }
    }
}

fn io_diagnostic(e: &io::Error) -> Diagnostic {
    match e.kind() {
        io::ErrorKind::TimedOut => {
            Diagnostic::temporary("4.4.1 connection to remote server timed out")
        }
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe => {
            Diagnostic::temporary("4.4.1 connection to remote server died")
        }
        _ => Diagnostic::temporary(format!("4.3.0 {e}")),
    }
}

/// Relays the remote reply. Codes of 500 and up are permanent.
fn rejection(stage: Stage, reply: &Reply) -> Diagnostic {
    let (class, digit) = if reply.code.as_u16() >= 500 {
        (DiagnosticClass::Permanent, '5')
    } else {
        (DiagnosticClass::Temporary, '4')
    };
    let text = match stage {
        Stage::Data => format!(
            "{digit}.3.0 remote host rejected DATA command: {}",
            reply.message_text()
        ),
        _ => format!("{} {}", reply.code, reply.message_text()),
    };
    Diagnostic::new(class, text)
}

/// Class letter of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticClass {
    /// `K`: message delivered.
    Success,
    /// `Z`: try again later.
    Temporary,
    /// `D`: give up and bounce.
    Permanent,
}

impl DiagnosticClass {
    /// Returns the single-letter prefix.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Success => 'K',
            Self::Temporary => 'Z',
            Self::Permanent => 'D',
        }
    }
}

/// One status line for the queue manager, e.g. `Z4.4.1 connection to remote
/// server died`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Class letter.
    pub class: DiagnosticClass,
    /// Status code and text following the letter.
    pub text: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    #[must_use]
    pub fn new(class: DiagnosticClass, text: impl Into<String>) -> Self {
        Self {
            class,
            text: text.into(),
        }
    }

    /// Successful delivery.
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self::new(DiagnosticClass::Success, text)
    }

    /// Temporary failure.
    #[must_use]
    pub fn temporary(text: impl Into<String>) -> Self {
        Self::new(DiagnosticClass::Temporary, text)
    }

    /// Permanent failure.
    #[must_use]
    pub fn permanent(text: impl Into<String>) -> Self {
        Self::new(DiagnosticClass::Permanent, text)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class.letter(), self.text)
    }
}
