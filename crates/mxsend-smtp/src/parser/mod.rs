//! SMTP reply line parser.

use crate::error::{Error, Result};
use crate::types::ReplyCode;

/// One parsed line of an SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    /// Reply code of this line.
    pub code: ReplyCode,
    /// True for the final line (`250 `), false for a continuation (`250-`).
    pub last: bool,
    /// Text after the separator.
    pub text: &'a str,
}

/// Parses a single reply line without its line terminator.
///
/// A valid line is longer than three bytes, carries `' '` or `'-'` as fourth
/// byte and starts with a code from 200 to 599:
/// - Single: `250 OK`
/// - Continuation: `250-PIPELINING`
///
/// # Errors
///
/// Returns [`Error::ReplySyntax`] if the line is malformed.
pub fn parse_line(line: &str) -> Result<ReplyLine<'_>> {
    let bytes = line.as_bytes();
    let syntax = || Error::ReplySyntax(line.to_string());

    if bytes.len() <= 3 {
        return Err(syntax());
    }
    let last = match bytes[3] {
        b' ' => true,
        b'-' => false,
        _ => return Err(syntax()),
    };
    let (class, rest) = (bytes[0], &bytes[1..3]);
    if !(b'2'..=b'5').contains(&class) || !rest.iter().all(u8::is_ascii_digit) {
        return Err(syntax());
    }

    let code = bytes[..3]
        .iter()
        .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));

    Ok(ReplyLine {
        code: ReplyCode::new(code),
        last,
        text: &line[4..],
    })
}
