//! Wire encodings for message bodies.
//!
//! Both encoders assume they start at the beginning of a line and write
//! SMTP-ready bytes: every line ends in CRLF and lines starting with a dot are
//! stuffed.

use crate::output::{BodySink, Output};

/// Maximum line length for Quoted-Printable output, soft-break `=` included.
pub const QP_LINE_LENGTH: usize = 76;

/// Room for content on a Quoted-Printable line before the soft break.
const QP_CONTENT_LENGTH: usize = QP_LINE_LENGTH - 1;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Length of the line break at the start of `buf`, if any.
const fn line_break_len(buf: &[u8]) -> Option<usize> {
    match buf {
        [b'\r', b'\n', ..] => Some(2),
        [b'\r' | b'\n', ..] => Some(1),
        _ => None,
    }
}

/// Copies `data` unchanged except for line-ending canonicalization and dot
/// stuffing.
///
/// Bare CR and bare LF both become CRLF.
pub fn encode_plain<S: BodySink>(data: &[u8], out: &mut Output<'_, S>) {
    let mut rest = data;
    let mut line_start = true;

    while let Some(&first) = rest.first() {
        if line_start && first == b'.' {
            out.push_atomic(b"..");
            rest = &rest[1..];
        }
        line_start = false;

        let Some(eol) = rest.iter().position(|&b| b == b'\r' || b == b'\n') else {
            out.extend(rest);
            return;
        };
        out.extend(&rest[..eol]);
        out.push_atomic(b"\r\n");
        rest = &rest[eol + line_break_len(&rest[eol..]).unwrap_or(1)..];
        line_start = true;
    }
}

/// One unit of Quoted-Printable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// Hard line break, consuming the given number of input bytes.
    LineBreak(usize),
    /// Byte copied as is.
    Literal(u8),
    /// Byte written as `=XX`.
    Escaped(u8),
    /// A dot, stuffed when it opens a line.
    Dot,
}

impl Token {
    fn next(rest: &[u8]) -> Option<Self> {
        if let Some(len) = line_break_len(rest) {
            return Some(Self::LineBreak(len));
        }
        let token = match rest {
            [] => return None,
            // whitespace at the end of a line would be stripped in transit
            [ws @ (b' ' | b'\t')] | [ws @ (b' ' | b'\t'), b'\r' | b'\n', ..] => Self::Escaped(*ws),
            [b'.', ..] => Self::Dot,
            [b @ (b'\t' | b' '..=b'<' | b'>'..=b'~'), ..] => Self::Literal(*b),
            [b, ..] => Self::Escaped(*b),
        };
        Some(token)
    }

    const fn consumed(self) -> usize {
        match self {
            Self::LineBreak(len) => len,
            Self::Literal(_) | Self::Escaped(_) | Self::Dot => 1,
        }
    }
}

/// Quoted-Printable encoder (RFC 2045 section 6.7) tracking the output column.
#[derive(Debug, Default)]
pub struct QuotedPrintable {
    column: usize,
}

impl QuotedPrintable {
    /// Creates an encoder positioned at the start of a line.
    #[must_use]
    pub const fn new() -> Self {
        Self { column: 0 }
    }

    /// Encodes `data` into `out`.
    pub fn encode<S: BodySink>(&mut self, data: &[u8], out: &mut Output<'_, S>) {
        let mut rest = data;
        while let Some(token) = Token::next(rest) {
            self.emit(token, out);
            rest = &rest[token.consumed()..];
        }
    }

    fn emit<S: BodySink>(&mut self, token: Token, out: &mut Output<'_, S>) {
        match token {
            Token::LineBreak(_) => {
                out.push_atomic(b"\r\n");
                self.column = 0;
            }
            Token::Literal(byte) => {
                self.reserve(1, out);
                out.push(byte);
                self.column += 1;
            }
            Token::Escaped(byte) => {
                self.reserve(3, out);
                out.push_atomic(&[
                    b'=',
                    HEX_DIGITS[usize::from(byte >> 4)],
                    HEX_DIGITS[usize::from(byte & 0x0f)],
                ]);
                self.column += 3;
            }
            Token::Dot => {
                self.reserve(1, out);
                if self.column == 0 {
                    out.push_atomic(b"..");
                    self.column = 2;
                } else {
                    out.push(b'.');
                    self.column += 1;
                }
            }
        }
    }

    /// Inserts a soft line break unless `width` more columns still fit.
    fn reserve<S: BodySink>(&mut self, width: usize, out: &mut Output<'_, S>) {
        if self.column + width > QP_CONTENT_LENGTH {
            out.push_atomic(b"=\r\n");
            self.column = 0;
        }
    }
}

/// Encodes `data` as Quoted-Printable, starting at the beginning of a line.
pub fn encode_quoted_printable<S: BodySink>(data: &[u8], out: &mut Output<'_, S>) {
    QuotedPrintable::new().encode(data, out);
}
