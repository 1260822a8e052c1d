//! Bounded output buffering for the body encoders.
//!
//! Both encoding paths write through a small reusable buffer that is handed to
//! a [`BodySink`] whenever it fills up. The [`TransmissionState`] follows the
//! flushed bytes so the end-of-data sequence can be chosen correctly no matter
//! where the chunk boundaries fell.

use bytes::BytesMut;

/// Capacity of the reusable send buffer.
pub const SEND_BUFFER_SIZE: usize = 1200;

/// Destination for flushed chunks of wire-ready body bytes.
pub trait BodySink {
    /// Accepts one chunk. Chunks arrive in transmission order.
    fn write_chunk(&mut self, chunk: &[u8]);
}

impl BodySink for Vec<u8> {
    fn write_chunk(&mut self, chunk: &[u8]) {
        self.extend_from_slice(chunk);
    }
}

/// Sink that drops every chunk and only counts the bytes.
///
/// Used to check a message completely before any of it is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Discard {
    written: usize,
}

impl Discard {
    /// Returns the number of bytes received so far.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }
}

impl BodySink for Discard {
    fn write_chunk(&mut self, chunk: &[u8]) {
        self.written += chunk.len();
    }
}

/// Tracks what has been emitted so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionState {
    last_lf: bool,
}

impl Default for TransmissionState {
    fn default() -> Self {
        Self::new()
    }
}

impl TransmissionState {
    /// State before any byte was sent: the DATA reply ended a line.
    #[must_use]
    pub const fn new() -> Self {
        Self { last_lf: true }
    }

    /// Returns true if the most recently emitted byte was a line feed.
    #[must_use]
    pub const fn last_lf(self) -> bool {
        self.last_lf
    }

    /// End-of-data sequence to append after the body.
    #[must_use]
    pub const fn terminator(self) -> &'static [u8] {
        if self.last_lf { b".\r\n" } else { b"\r\n.\r\n" }
    }

    fn observe(&mut self, chunk: &[u8]) {
        if let Some(&last) = chunk.last() {
            self.last_lf = last == b'\n';
        }
    }
}

/// Reusable bounded buffer in front of a [`BodySink`].
#[derive(Debug)]
pub struct Output<'s, S: BodySink> {
    sink: &'s mut S,
    buf: BytesMut,
    state: TransmissionState,
    flushed: usize,
}

impl<'s, S: BodySink> Output<'s, S> {
    /// Creates an output starting from a fresh transmission state.
    pub fn new(sink: &'s mut S) -> Self {
        Self::with_state(sink, TransmissionState::new())
    }

    /// Creates an output continuing from an earlier state.
    pub fn with_state(sink: &'s mut S, state: TransmissionState) -> Self {
        Self {
            sink,
            buf: BytesMut::with_capacity(SEND_BUFFER_SIZE),
            state,
            flushed: 0,
        }
    }

    /// Appends a single byte.
    pub fn push(&mut self, byte: u8) {
        if self.buf.len() == SEND_BUFFER_SIZE {
            self.flush();
        }
        self.buf.extend_from_slice(&[byte]);
    }

    /// Appends a run of bytes that must not be split by a flush, such as an
    /// escape sequence or a line break.
    pub fn push_atomic(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= SEND_BUFFER_SIZE);
        if self.buf.len() + data.len() > SEND_BUFFER_SIZE {
            self.flush();
        }
        self.buf.extend_from_slice(data);
    }

    /// Appends an arbitrary run of bytes, flushing as often as needed.
    pub fn extend(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let room = SEND_BUFFER_SIZE - self.buf.len();
            if room == 0 {
                self.flush();
                continue;
            }
            let take = room.min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
        }
    }

    /// Hands the buffered bytes to the sink.
    pub fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        self.state.observe(&self.buf);
        self.sink.write_chunk(&self.buf);
        self.flushed += self.buf.len();
        self.buf.clear();
    }

    /// Current state, including bytes still sitting in the buffer.
    #[must_use]
    pub fn state(&self) -> TransmissionState {
        let mut state = self.state;
        state.observe(&self.buf);
        state
    }

    /// Total number of bytes emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flushed + self.buf.len()
    }

    /// Returns true if nothing was emitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes the remainder and returns the final state.
    pub fn finish(mut self) -> TransmissionState {
        self.flush();
        self.state
    }
}
