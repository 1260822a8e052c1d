//! SMTP extension types.

use super::Reply;

/// SMTP extensions discovered from EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// CHUNKING - Chunked message transfer
    Chunking,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// DSN - Delivery status notifications
    Dsn,
    /// BINARYMIME - Binary MIME
    BinaryMime,
    /// Unknown extension
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "SIZE" => Self::Size(parts.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "CHUNKING" => Self::Chunking,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            "BINARYMIME" => Self::BinaryMime,
            _ => Self::Unknown(line.to_string()),
        }
    }

    /// Bit of this extension in an [`ExtensionSet`].
    const fn bit(&self) -> u16 {
        match self {
            Self::StartTls => 1 << 0,
            Self::Size(_) => 1 << 1,
            Self::EightBitMime => 1 << 2,
            Self::Pipelining => 1 << 3,
            Self::Chunking => 1 << 4,
            Self::SmtpUtf8 => 1 << 5,
            Self::Dsn => 1 << 6,
            Self::BinaryMime => 1 << 7,
            Self::Unknown(_) => 0,
        }
    }
}

/// Negotiated extension bitmap of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtensionSet {
    bits: u16,
    max_size: Option<usize>,
}

impl ExtensionSet {
    /// No extensions, as after a HELO greeting.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            max_size: None,
        }
    }

    /// Builds the set from an EHLO reply. The first line is the server's
    /// greeting and is skipped.
    #[must_use]
    pub fn from_ehlo(reply: &Reply) -> Self {
        let mut set = Self::empty();
        for line in reply.lines.iter().skip(1) {
            set.insert(&Extension::parse(line));
        }
        set
    }

    /// Adds an extension.
    pub fn insert(&mut self, ext: &Extension) {
        self.bits |= ext.bit();
        if let Extension::Size(size) = ext {
            self.max_size = *size;
        }
    }

    /// Checks if the server supports an extension. Parameters are ignored.
    #[must_use]
    pub const fn supports(&self, ext: &Extension) -> bool {
        let bit = ext.bit();
        bit != 0 && self.bits & bit == bit
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub const fn starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if 8BITMIME is supported.
    #[must_use]
    pub const fn eight_bit_mime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Checks if CHUNKING is supported.
    #[must_use]
    pub const fn chunking(&self) -> bool {
        self.supports(&Extension::Chunking)
    }

    /// Checks if SIZE is supported.
    #[must_use]
    pub const fn size(&self) -> bool {
        self.supports(&Extension::Size(None))
    }

    /// Returns the advertised size limit. A missing or zero value means no
    /// limit.
    #[must_use]
    pub const fn max_size(&self) -> Option<usize> {
        match self.max_size {
            Some(0) | None => None,
            limit => limit,
        }
    }

    /// Returns the raw bitmap.
    #[must_use]
    pub const fn bits(&self) -> u16 {
        self.bits
    }
}
