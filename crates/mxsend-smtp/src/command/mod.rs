//! SMTP command builder.

use std::fmt::Write;

use crate::types::Address;

/// BODY parameter of MAIL FROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// `BODY=8BITMIME`
    EightBitMime,
}

impl BodyType {
    /// Returns the parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EightBitMime => "8BITMIME",
        }
    }
}

/// Command sent by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO`, used when EHLO is refused.
    Helo {
        /// Our name
        hostname: String,
    },
    /// `EHLO`
    Ehlo {
        /// Our name
        hostname: String,
    },
    /// `STARTTLS`
    StartTls,
    /// `MAIL FROM` with optional SIZE and BODY parameters.
    MailFrom {
        /// Reverse path, possibly null
        from: Address,
        /// Message size in octets
        size: Option<usize>,
        /// Body type
        body: Option<BodyType>,
    },
    /// `RCPT TO`
    RcptTo {
        /// Forward path
        to: Address,
    },
    /// `DATA`
    Data,
    /// `BDAT`, followed by exactly `size` octets of message data.
    Bdat {
        /// Octets in the chunk
        size: usize,
        /// This is the final chunk
        last: bool,
    },
    /// `QUIT`
    Quit,
}

impl Command {
    /// Returns the command line, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = match self {
            Self::Helo { hostname } => format!("HELO {hostname}"),
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::MailFrom { from, size, body } => {
                let mut line = format!("MAIL FROM:{from}");
                if let Some(size) = size {
                    let _ = write!(line, " SIZE={size}");
                }
                if let Some(body) = body {
                    line.push_str(" BODY=");
                    line.push_str(body.as_str());
                }
                line
            }
            Self::RcptTo { to } => format!("RCPT TO:{to}"),
            Self::Data => "DATA".to_string(),
            Self::Bdat { size, last: false } => format!("BDAT {size}"),
            Self::Bdat { size, last: true } => format!("BDAT {size} LAST"),
            Self::Quit => "QUIT".to_string(),
        };
        line.push_str("\r\n");
        line.into_bytes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn greetings() {
        let helo = Command::Helo {
            hostname: "relay.example.com".to_string(),
        };
        assert_eq!(helo.serialize(), b"HELO relay.example.com\r\n");
        let ehlo = Command::Ehlo {
            hostname: "relay.example.com".to_string(),
        };
        assert_eq!(ehlo.serialize(), b"EHLO relay.example.com\r\n");
    }

    #[test]
    fn starttls_command() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
    }

    #[test]
    fn mail_from_simple() {
        let cmd = Command::MailFrom {
            from: Address::new("sender@example.com").unwrap(),
            size: None,
            body: None,
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn mail_from_with_params() {
        let cmd = Command::MailFrom {
            from: Address::new("sender@example.com").unwrap(),
            size: Some(12345),
            body: Some(BodyType::EightBitMime),
        };
        assert_eq!(
            cmd.serialize(),
            b"MAIL FROM:<sender@example.com> SIZE=12345 BODY=8BITMIME\r\n"
        );
    }

    #[test]
    fn mail_from_null_sender() {
        let cmd = Command::MailFrom {
            from: Address::null(),
            size: None,
            body: None,
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<>\r\n");
    }

    #[test]
    fn rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: Address::new("recipient@example.com").unwrap(),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn bdat_commands() {
        let chunk = Command::Bdat {
            size: 15000,
            last: false,
        };
        assert_eq!(chunk.serialize(), b"BDAT 15000\r\n");
        let last = Command::Bdat { size: 17, last: true };
        assert_eq!(last.serialize(), b"BDAT 17 LAST\r\n");
    }

    #[test]
    fn simple_commands() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn body_type_values() {
        assert_eq!(BodyType::EightBitMime.as_str(), "8BITMIME");
    }
}
