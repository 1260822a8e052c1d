//! SMTP reply types.

use std::fmt;

/// Complete SMTP reply from the server, continuation lines included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Text of every reply line without code and separator.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the text of the last line, which carries the final status.
    #[must_use]
    pub fn text(&self) -> &str {
        self.lines.last().map_or("", String::as_str)
    }

    /// Returns all lines joined with `/`, suitable for a one-line report.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.lines.join("/")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the leading digit.
    #[must_use]
    pub const fn class(self) -> u16 {
        self.0 / 100
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.class() == 3
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.class() == 4
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.class() == 5
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Codes the relay acts on.
impl ReplyCode {
    /// 220, greeting
    pub const SERVICE_READY: Self = Self(220);
    /// 221, reply to QUIT
    pub const CLOSING: Self = Self(221);
    /// 250, accepted
    pub const OK: Self = Self(250);
    /// 354, send the message
    pub const START_DATA: Self = Self(354);
    /// 421, the server is going away
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            for (code, class) in [(220, 2), (354, 3), (451, 4), (554, 5)] {
                assert_eq!(ReplyCode::new(code).class(), class);
            }
        }

        #[test]
        fn predicates() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::CLOSING.is_success());
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(!ReplyCode::START_DATA.is_success());
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::new(550).is_permanent());
            assert!(!ReplyCode::new(450).is_permanent());
        }

        #[test]
        fn display() {
            assert_eq!(ReplyCode::SERVICE_READY.to_string(), "220");
            assert_eq!(ReplyCode::new(552).as_u16(), 552);
        }
    }

    mod reply_tests {
        use super::*;

        fn reply(code: u16, lines: &[&str]) -> Reply {
            Reply::new(
                ReplyCode::new(code),
                lines.iter().map(ToString::to_string).collect(),
            )
        }

        #[test]
        fn text_is_last_line() {
            let reply = reply(250, &["mx.example.org", "PIPELINING", "8BITMIME"]);
            assert_eq!(reply.text(), "8BITMIME");
            assert_eq!(reply.message_text(), "mx.example.org/PIPELINING/8BITMIME");
        }

        #[test]
        fn empty_text() {
            let reply = reply(250, &[]);
            assert_eq!(reply.text(), "");
            assert_eq!(reply.to_string(), "250 ");
        }

        #[test]
        fn display_uses_last_line() {
            let reply = reply(550, &["5.1.1 no such user", "5.1.1 really"]);
            assert_eq!(reply.to_string(), "550 5.1.1 really");
            assert!(reply.is_permanent_error());
            assert!(!reply.is_transient_error());
        }
    }
}
