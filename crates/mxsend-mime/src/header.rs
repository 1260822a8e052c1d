//! Header block scanning.
//!
//! The scanner walks the raw header lines of a message (or of a MIME part)
//! without copying anything. It locates the end of the header block and the
//! byte spans of the `Content-Type` and `Content-Transfer-Encoding` fields,
//! including any folded continuation lines.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::scan::need_recode;

const CONTENT_TYPE: &[u8] = b"content-type:";
const TRANSFER_ENCODING: &[u8] = b"content-transfer-encoding:";

/// Result of scanning a header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderScan {
    /// Length of the header block as it is copied to the wire.
    ///
    /// For a regular header this stops right before the empty separator line,
    /// which then starts the body. An empty header consists of the separator
    /// alone and is included here.
    pub end: usize,
    /// Span of the `Content-Type` field, terminator included.
    pub content_type: Option<Range<usize>>,
    /// Span of the `Content-Transfer-Encoding` field, terminator included.
    pub transfer_encoding: Option<Range<usize>>,
}

/// What the scanner finds at the start of a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStart {
    /// Empty line: end of the header block.
    Separator,
    /// Start of the `Content-Type` field.
    ContentType,
    /// Start of the `Content-Transfer-Encoding` field.
    TransferEncoding,
    /// Any other field or a continuation line.
    Other,
}

impl LineStart {
    fn classify(line: &[u8]) -> Self {
        match line.first() {
            Some(b'\r' | b'\n') => Self::Separator,
            _ if starts_with_ignore_case(line, CONTENT_TYPE) => Self::ContentType,
            _ if starts_with_ignore_case(line, TRANSFER_ENCODING) => Self::TransferEncoding,
            _ => Self::Other,
        }
    }
}

fn starts_with_ignore_case(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Scans the header block at the start of `buf`.
///
/// # Errors
///
/// Returns [`Error::UnencodedHeader`] if the header contains 8-bit bytes (or
/// if there is no header/body separator and the data contains 8-bit bytes),
/// and [`Error::UnterminatedHeader`] if no separator exists at all.
pub fn scan_header(buf: &[u8]) -> Result<HeaderScan> {
    let Some(scan) = locate(buf) else {
        return Err(if need_recode(buf).has_8bit() {
            Error::UnencodedHeader
        } else {
            Error::UnterminatedHeader
        });
    };

    if need_recode(&buf[..scan.end]).has_8bit() {
        return Err(Error::UnencodedHeader);
    }

    Ok(scan)
}

fn locate(buf: &[u8]) -> Option<HeaderScan> {
    let mut scan = HeaderScan {
        end: 0,
        content_type: None,
        transfer_encoding: None,
    };

    match buf {
        [b'\r', b'\n', ..] => {
            scan.end = 2;
            return Some(scan);
        }
        [b'\r' | b'\n', ..] => {
            scan.end = 1;
            return Some(scan);
        }
        _ => {}
    }

    let mut pos = 0;
    while pos < buf.len() {
        let line = &buf[pos..];
        match LineStart::classify(line) {
            LineStart::Separator => {
                scan.end = pos;
                return Some(scan);
            }
            LineStart::ContentType => {
                let len = field_len(line)?;
                scan.content_type = Some(pos..pos + len);
                pos += len;
            }
            LineStart::TransferEncoding => {
                let len = field_len(line)?;
                scan.transfer_encoding = Some(pos..pos + len);
                pos += len;
            }
            LineStart::Other => pos += line_len(line)?,
        }
    }

    None
}

/// Length of one physical line including its CR, LF or CRLF terminator.
fn line_len(buf: &[u8]) -> Option<usize> {
    let eol = buf.iter().position(|&b| b == b'\r' || b == b'\n')?;
    Some(eol + terminator_len(&buf[eol..]))
}

fn terminator_len(buf: &[u8]) -> usize {
    match buf {
        [b'\r', b'\n', ..] => 2,
        [b'\r' | b'\n', ..] => 1,
        _ => 0,
    }
}

/// Length of a header field including folded continuation lines.
///
/// Returns `None` if the field is not terminated before the end of `buf`.
#[must_use]
pub fn field_len(buf: &[u8]) -> Option<usize> {
    let mut pos = 0;
    loop {
        pos += line_len(&buf[pos..])?;
        match buf.get(pos) {
            Some(b' ' | b'\t') => {}
            _ => return Some(pos),
        }
    }
}
