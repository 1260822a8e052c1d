//! Whole-message encoding for the DATA command.
//!
//! A message that is 7-bit clean (or 8-bit with a peer that announced
//! 8BITMIME) and has no overlong lines goes out on the plain path. Everything
//! else is recoded: the header gets a new `Content-Transfer-Encoding` field,
//! discrete bodies become Quoted-Printable, and multipart bodies are walked
//! part by part so that only the parts that need it are touched.

use std::ops::Range;

use crate::boundary::{find_delimiter, search_origin, skip_padding};
use crate::content_type::{Boundary, ContentType};
use crate::encoding::{encode_plain, encode_quoted_printable};
use crate::error::Result;
use crate::header::{HeaderScan, scan_header};
use crate::output::{BodySink, Output, TransmissionState};
use crate::scan::{Recode, need_recode};

/// Written instead of a preamble that would need recoding, followed by the
/// first delimiter.
const PREAMBLE_DISCARDED: &[u8] = b"\r\ninvalid MIME preamble was discarded.\r\n\r\n";

/// Written instead of an epilogue that would need recoding.
const EPILOGUE_DISCARDED: &[u8] = b"\r\ninvalid MIME epilogue has been discarded.\r\n";

/// Deepest multipart nesting that is walked part by part. Deeper entities
/// are recoded as a whole.
const MAX_NESTING: usize = 32;

/// Peer capabilities and identity used while encoding.
#[derive(Debug, Clone, Copy)]
pub struct Options<'a> {
    /// The peer accepts 8-bit body data.
    pub eight_bit_mime: bool,
    /// Our HELO name, recorded in synthesized headers.
    pub helo_name: &'a str,
    /// Name and version of the recoding agent.
    pub agent: &'a str,
}

/// How the body was put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Canonicalized and dot-stuffed only.
    Plain,
    /// Recoded to Quoted-Printable where needed.
    Recoded,
}

/// Outcome of a successful encoding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    /// Path taken.
    pub mode: BodyMode,
    /// State after the last body byte, used to pick the terminator.
    pub state: TransmissionState,
    /// Number of bytes written to the sink.
    pub len: usize,
}

/// Checks the top-level structure of a message before anything is sent.
///
/// Returns the recoding requirements of the whole message. A message that can
/// never need recoding goes out unchanged, so it is accepted without a
/// header/body separator or with a `Content-Type` the recoder could not use.
/// A declared boundary value must be valid in every case.
///
/// # Errors
///
/// Returns the local-data error that encoding this message would run into.
pub fn preflight(message: &[u8]) -> Result<Recode> {
    let recode = need_recode(message);
    match scan_header(message) {
        Ok(HeaderScan {
            content_type: Some(field),
            ..
        }) => match ContentType::parse(&message[field]) {
            Ok(_) => {}
            Err(err) if recode.is_clean() && !err.is_boundary_defect() => {
                tracing::debug!(%err, "Content-Type not usable for recoding, message is 7bit clean");
            }
            Err(err) => return Err(err),
        },
        Ok(_) => {}
        Err(err) if recode.is_clean() => {
            tracing::debug!(%err, "Header not recodable, message is 7bit clean");
        }
        Err(err) => return Err(err),
    }
    Ok(recode)
}

/// Encodes `message` for transmission after a `354` reply.
///
/// The output does not include the end-of-data sequence; use
/// [`TransmissionState::terminator`] on the returned state.
///
/// # Errors
///
/// Returns a local-data error if the message needs recoding but its MIME
/// structure is malformed. Bytes already written to `sink` must then be
/// discarded.
pub fn encode_body<S: BodySink>(
    message: &[u8],
    options: &Options<'_>,
    sink: &mut S,
) -> Result<Encoded> {
    let mut out = Output::new(sink);

    let mode = if need_recode(message).requires_qp(options.eight_bit_mime) {
        Recoder::new(options).entity(message, 0, &mut out)?;
        BodyMode::Recoded
    } else {
        encode_plain(message, &mut out);
        BodyMode::Plain
    };

    let len = out.len();
    Ok(Encoded {
        mode,
        state: out.finish(),
        len,
    })
}

/// Quoted-Printable recoding of MIME entities.
struct Recoder {
    /// Replacement `Content-Transfer-Encoding` field, terminator included.
    header_field: Vec<u8>,
    eight_bit_mime: bool,
}

impl Recoder {
    fn new(options: &Options<'_>) -> Self {
        let header_field = format!(
            "Content-Transfer-Encoding: quoted-printable (recoded by: {} at {})\r\n",
            options.agent, options.helo_name
        );
        Self {
            header_field: header_field.into_bytes(),
            eight_bit_mime: options.eight_bit_mime,
        }
    }

    /// Recodes a message or body part, header included.
    fn entity<S: BodySink>(
        &self,
        entity: &[u8],
        depth: usize,
        out: &mut Output<'_, S>,
    ) -> Result<()> {
        let scan = scan_header(entity)?;
        let content_type = match scan.content_type {
            Some(field) => ContentType::parse(&entity[field])?,
            None => ContentType::Discrete,
        };
        let header = &entity[..scan.end];
        let body = &entity[scan.end..];

        match content_type.boundary() {
            Some(boundary) if depth < MAX_NESTING => {
                // parts carry their own encoding, the container stays 7bit
                self.header(header, scan.transfer_encoding, false, out);
                self.multipart(body, boundary, depth, out)
            }
            _ => {
                self.header(header, scan.transfer_encoding, true, out);
                encode_quoted_printable(body, out);
                Ok(())
            }
        }
    }

    /// Copies a header without its `Content-Transfer-Encoding` field,
    /// optionally putting the replacement field in its place.
    fn header<S: BodySink>(
        &self,
        header: &[u8],
        transfer_encoding: Option<Range<usize>>,
        replace: bool,
        out: &mut Output<'_, S>,
    ) {
        let (before, after) = match transfer_encoding {
            Some(field) => (&header[..field.start], &header[field.end..]),
            None => (&header[..0], header),
        };
        encode_plain(before, out);
        if replace {
            out.extend(&self.header_field);
        }
        encode_plain(after, out);
    }

    fn multipart<S: BodySink>(
        &self,
        body: &[u8],
        boundary: Boundary<'_>,
        depth: usize,
        out: &mut Output<'_, S>,
    ) -> Result<()> {
        let Some(first) = find_delimiter(body, 0, boundary) else {
            tracing::warn!("Multipart body without delimiter, wrapping it in a single part");
            out.extend(b"\r\n");
            delimiter(boundary, out);
            out.extend(b"\r\n");
            out.extend(&self.header_field);
            out.extend(b"\r\n");
            encode_quoted_printable(body, out);
            out.extend(b"\r\n");
            delimiter(boundary, out);
            out.extend(b"--\r\n");
            return Ok(());
        };

        let preamble = &body[..first.start];
        if need_recode(preamble).is_clean() {
            encode_plain(preamble, out);
        } else {
            tracing::error!("Discarding invalid MIME preamble");
            out.extend(PREAMBLE_DISCARDED);
        }
        delimiter(boundary, out);

        let mut pos = first.end;
        let mut closed = false;
        if first.close {
            // keep the result a valid multipart entity with one empty part
            out.extend(b"\r\n\r\n");
            delimiter(boundary, out);
            out.extend(b"--");
            pos += 2;
            closed = true;
        }
        pos += skip_padding(body, pos);
        out.extend(b"\r\n");

        while !closed {
            let Some(next) = find_delimiter(body, search_origin(body, pos), boundary) else {
                // unterminated last part: send it and close the entity
                let rest = &body[pos..];
                if !rest.is_empty() {
                    self.part(rest, depth, out)?;
                    out.extend(b"\r\n");
                }
                delimiter(boundary, out);
                out.extend(b"--\r\n");
                return Ok(());
            };

            self.part(&body[pos..next.start], depth, out)?;
            delimiter(boundary, out);
            pos = next.end;
            if next.close {
                out.extend(b"--");
                pos += 2;
                closed = true;
            }
            pos += skip_padding(body, pos);

            if pos == body.len() {
                if !closed {
                    out.extend(b"--");
                }
                out.extend(b"\r\n");
                return Ok(());
            }
            out.extend(b"\r\n");
        }

        let epilogue = &body[pos..];
        if need_recode(epilogue).is_clean() {
            encode_plain(epilogue, out);
        } else {
            tracing::error!("Discarding invalid MIME epilogue");
            out.extend(EPILOGUE_DISCARDED);
        }
        Ok(())
    }

    /// Sends one body part, recoding it only if the peer could not take it.
    fn part<S: BodySink>(&self, part: &[u8], depth: usize, out: &mut Output<'_, S>) -> Result<()> {
        if need_recode(part).requires_qp(self.eight_bit_mime) {
            self.entity(part, depth + 1, out)
        } else {
            encode_plain(part, out);
            Ok(())
        }
    }
}

/// Writes `--boundary`.
fn delimiter<S: BodySink>(boundary: Boundary<'_>, out: &mut Output<'_, S>) {
    out.extend(b"--");
    out.extend(boundary.as_bytes());
}
