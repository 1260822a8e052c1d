//! # mxsend-mime
//!
//! Wire-safe encoding of queued messages for SMTP transmission.
//!
//! ## Features
//!
//! - **Plain path**: CRLF canonicalization and leading-dot stuffing, no byte
//!   value changes
//! - **Quoted-Printable recoding**: for peers without 8BITMIME and for lines
//!   longer than 998 characters
//! - **Multipart aware**: only the parts that need it are recoded, delimiter
//!   lines are copied verbatim
//! - **Bounded output**: everything is written through a 1200 byte buffer to a
//!   [`BodySink`]
//!
//! ## Quick Start
//!
//! ```
//! use mxsend_mime::{BodyMode, Options, encode_body};
//!
//! let message = b"Subject: hi\n\n.hello\n";
//! let options = Options {
//!     eight_bit_mime: false,
//!     helo_name: "relay.example.org",
//!     agent: "mxsend",
//! };
//!
//! let mut wire = Vec::new();
//! let encoded = encode_body(message, &options, &mut wire)?;
//! assert_eq!(encoded.mode, BodyMode::Plain);
//! assert_eq!(wire, b"Subject: hi\r\n\r\n..hello\r\n");
//! assert_eq!(encoded.state.terminator(), b".\r\n");
//! # Ok::<(), mxsend_mime::Error>(())
//! ```
//!
//! Malformed messages are reported as [`Error`]. All of them are defects of
//! the queued data and map to the `5.6.3` enhanced status code.

#![forbid(unsafe_code)]

mod boundary;
mod content_type;
mod error;
mod header;
mod message;
mod output;
mod scan;

pub mod encoding;

pub use boundary::{Delimiter, find_delimiter};
pub use content_type::{Boundary, ContentType, MAX_BOUNDARY_LENGTH};
pub use error::{Error, Result};
pub use header::{HeaderScan, field_len, scan_header};
pub use message::{BodyMode, Encoded, Options, encode_body, preflight};
pub use output::{BodySink, Discard, Output, SEND_BUFFER_SIZE, TransmissionState};
pub use scan::{MAX_LINE_LENGTH, Recode, need_recode};
