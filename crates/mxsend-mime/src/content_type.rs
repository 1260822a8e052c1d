//! Content-Type inspection.
//!
//! The transmitter only needs to know one thing about a `Content-Type` field:
//! whether it declares a composite type (`multipart/*` or `message/*`) and, if
//! so, which boundary delimits the parts. Everything else about the field is
//! copied through untouched.

use crate::error::{Error, Result};

/// Length of the `Content-Type:` field name including the colon.
const FIELD_NAME_LEN: usize = 13;

/// Longest accepted boundary value.
pub const MAX_BOUNDARY_LENGTH: usize = 68;

/// A validated MIME boundary, borrowed from the message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary<'a>(&'a [u8]);

impl<'a> Boundary<'a> {
    /// Validates a boundary value against RFC 2046.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BoundaryEmpty`], [`Error::BoundaryTooLong`] or
    /// [`Error::BoundaryInvalidChar`].
    pub fn new(value: &'a [u8]) -> Result<Self> {
        if value.is_empty() {
            return Err(Error::BoundaryEmpty);
        }
        if value.len() > MAX_BOUNDARY_LENGTH {
            return Err(Error::BoundaryTooLong);
        }
        if let Some(&bad) = value.iter().find(|&&b| !is_bchar(b)) {
            return Err(Error::BoundaryInvalidChar(bad));
        }
        if value.last() == Some(&b' ') {
            return Err(Error::BoundaryInvalidChar(b' '));
        }
        Ok(Self(value))
    }

    /// Returns the boundary bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Returns the boundary length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: empty boundaries are rejected on construction.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `bchars` from RFC 2046 section 5.1.1.
const fn is_bchar(b: u8) -> bool {
    matches!(b,
        b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z'
        | b'\'' | b'(' | b')' | b'+' | b'_' | b','
        | b'-' | b'.' | b'/' | b':' | b'=' | b'?' | b' ')
}

/// `tspecials` from RFC 2045 section 5.1.
const fn is_tspecial(b: u8) -> bool {
    matches!(b,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':'
        | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'=')
}

const fn is_token_char(b: u8) -> bool {
    b > b' ' && b < 0x7f && !is_tspecial(b)
}

/// What a `Content-Type` field declares, as far as transmission cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType<'a> {
    /// `multipart/*` or `message/*` with its boundary.
    Composite(Boundary<'a>),
    /// Any other type.
    Discrete,
}

impl<'a> ContentType<'a> {
    /// Parses a complete `Content-Type` field, name and folding included.
    ///
    /// A missing field should be treated as [`ContentType::Discrete`] by the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContentTypeSyntax`] if a composite type has no valid
    /// boundary parameter or the field is malformed, and the boundary errors of
    /// [`Boundary::new`] if the boundary value itself is invalid.
    pub fn parse(field: &'a [u8]) -> Result<Self> {
        let value = field.get(FIELD_NAME_LEN..).ok_or(Error::ContentTypeSyntax)?;
        let mut cursor = Cursor::new(value);

        cursor.skip_cfws()?;
        if cursor.at_end() {
            return Err(Error::ContentTypeSyntax);
        }

        let main_type = cursor.token();
        if !main_type.eq_ignore_ascii_case(b"multipart")
            && !main_type.eq_ignore_ascii_case(b"message")
        {
            return Ok(Self::Discrete);
        }
        if !cursor.eat(b'/') {
            return Ok(Self::Discrete);
        }
        if cursor.token().is_empty() || cursor.peek() == Some(b'=') {
            return Err(Error::ContentTypeSyntax);
        }

        cursor.skip_cfws()?;
        loop {
            // a composite type without boundary is invalid
            if !cursor.eat(b';') {
                return Err(Error::ContentTypeSyntax);
            }
            cursor.skip_cfws()?;

            let name = cursor.token();
            if name.is_empty() || !cursor.eat(b'=') {
                return Err(Error::ContentTypeSyntax);
            }

            if name.eq_ignore_ascii_case(b"boundary") {
                let raw = if cursor.peek() == Some(b'"') {
                    cursor.quoted().ok_or(Error::BoundaryUnterminated)?
                } else {
                    cursor.bare_value()
                };
                return Boundary::new(raw).map(Self::Composite);
            }

            if cursor.peek() == Some(b'"') {
                cursor.quoted().ok_or(Error::ContentTypeSyntax)?;
            } else if cursor.token().is_empty() {
                return Err(Error::ContentTypeSyntax);
            }
            cursor.skip_cfws()?;
        }
    }

    /// Returns the boundary of a composite type.
    #[must_use]
    pub const fn boundary(&self) -> Option<Boundary<'a>> {
        match self {
            Self::Composite(boundary) => Some(*boundary),
            Self::Discrete => None,
        }
    }
}

/// Comment scanning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comment {
    /// Inside a comment at the given nesting depth.
    Text(usize),
    /// After a backslash inside a comment.
    Escape(usize),
}

/// Byte cursor over a header field value.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skips whitespace, folding line breaks and RFC 822 comments.
    fn skip_cfws(&mut self) -> Result<()> {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'(' => self.skip_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) -> Result<()> {
        self.pos += 1;
        let mut state = Comment::Text(1);
        while let Some(byte) = self.peek() {
            self.pos += 1;
            state = match (state, byte) {
                (Comment::Escape(depth), _) => Comment::Text(depth),
                (Comment::Text(depth), b'\\') => Comment::Escape(depth),
                (Comment::Text(depth), b'(') => Comment::Text(depth + 1),
                (Comment::Text(1), b')') => return Ok(()),
                (Comment::Text(depth), b')') => Comment::Text(depth - 1),
                (Comment::Text(depth), _) => Comment::Text(depth),
            };
        }
        Err(Error::ContentTypeSyntax)
    }

    fn token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(is_token_char) {
            self.pos += 1;
        }
        &self.buf[start..self.pos]
    }

    /// Reads a quoted string and returns its raw contents without quotes.
    ///
    /// Returns `None` if the closing quote is missing.
    fn quoted(&mut self) -> Option<&'a [u8]> {
        let start = self.pos + 1;
        let mut pos = start;
        while pos < self.buf.len() {
            match self.buf[pos] {
                b'\\' => pos += 2,
                b'"' => {
                    self.pos = pos + 1;
                    return Some(&self.buf[start..pos]);
                }
                _ => pos += 1,
            }
        }
        None
    }

    /// Reads an unquoted parameter value up to whitespace, `;` or a comment.
    fn bare_value(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b';' | b'(') {
                break;
            }
            self.pos += 1;
        }
        &self.buf[start..self.pos]
    }
}
