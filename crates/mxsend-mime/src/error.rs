//! Error types for body encoding.
//!
//! Every variant describes a defect in the queued message itself. None of them
//! can be cured by trying another host, so callers should report them with
//! [`Error::status`] and give up on the message.

/// Result type alias for encoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed message data found while preparing the body for transmission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// 8-bit bytes inside a header block, which cannot be recoded.
    #[error("message contains unencoded 8bit data in message header")]
    UnencodedHeader,

    /// No empty line separates the header from the body.
    #[error("message header is not terminated by an empty line")]
    UnterminatedHeader,

    /// The Content-Type field could not be parsed, or a multipart/message
    /// type lacks its boundary parameter.
    #[error("syntax error in Content-Type message header")]
    ContentTypeSyntax,

    /// Quoted boundary value without closing quote.
    #[error("boundary definition is unterminated quoted string")]
    BoundaryUnterminated,

    /// Boundary longer than the 70 octets of RFC 2046 minus the leading dashes.
    #[error("boundary definition is too long")]
    BoundaryTooLong,

    /// Boundary parameter present but empty.
    #[error("boundary definition is empty")]
    BoundaryEmpty,

    /// Boundary contains a byte outside the RFC 2046 `bchars` set.
    #[error("boundary definition contains invalid character")]
    BoundaryInvalidChar(u8),
}

impl Error {
    /// RFC 3463 enhanced status code for this defect.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        "5.6.3"
    }

    /// Returns true if the defect is in a declared boundary value.
    #[must_use]
    pub const fn is_boundary_defect(&self) -> bool {
        matches!(
            self,
            Self::BoundaryUnterminated
                | Self::BoundaryTooLong
                | Self::BoundaryEmpty
                | Self::BoundaryInvalidChar(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn all_defects_are_media_errors() {
        let errors = [
            Error::UnencodedHeader,
            Error::UnterminatedHeader,
            Error::ContentTypeSyntax,
            Error::BoundaryUnterminated,
            Error::BoundaryTooLong,
            Error::BoundaryEmpty,
            Error::BoundaryInvalidChar(b'"'),
        ];
        for error in errors {
            assert_eq!(error.status(), "5.6.3");
        }
    }

    #[test]
    fn boundary_defects() {
        assert!(Error::BoundaryTooLong.is_boundary_defect());
        assert!(Error::BoundaryInvalidChar(b'<').is_boundary_defect());
        assert!(!Error::ContentTypeSyntax.is_boundary_defect());
        assert!(!Error::UnterminatedHeader.is_boundary_defect());
    }

    #[test]
    fn display_text() {
        assert_eq!(
            Error::BoundaryTooLong.to_string(),
            "boundary definition is too long"
        );
        assert_eq!(
            Error::UnencodedHeader.to_string(),
            "message contains unencoded 8bit data in message header"
        );
    }
}
