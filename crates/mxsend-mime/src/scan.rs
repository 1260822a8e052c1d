//! Recoding requirements of a byte range.

/// Longest line (without terminator) allowed by RFC 5321.
pub const MAX_LINE_LENGTH: usize = 998;

/// Why a byte range cannot be sent unmodified.
///
/// Bit 0 is set for 8-bit content, bit 1 for lines longer than
/// [`MAX_LINE_LENGTH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Recode(u8);

impl Recode {
    /// Nothing to recode.
    pub const CLEAN: Self = Self(0);
    /// Some byte has the high bit set.
    pub const EIGHT_BIT: Self = Self(1);
    /// Some line is longer than [`MAX_LINE_LENGTH`].
    pub const LONG_LINES: Self = Self(2);

    /// Returns the raw 2-bit value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if the range can go out as is.
    #[must_use]
    pub const fn is_clean(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the range contains 8-bit bytes.
    #[must_use]
    pub const fn has_8bit(self) -> bool {
        self.0 & Self::EIGHT_BIT.0 != 0
    }

    /// Returns true if the range contains overlong lines.
    #[must_use]
    pub const fn has_long_lines(self) -> bool {
        self.0 & Self::LONG_LINES.0 != 0
    }

    /// Decides whether quoted-printable recoding is needed for a peer.
    ///
    /// Long lines always have to be broken; 8-bit data only when the peer did
    /// not announce 8BITMIME.
    #[must_use]
    pub const fn requires_qp(self, eight_bit_mime: bool) -> bool {
        self.has_long_lines() || (self.has_8bit() && !eight_bit_mime)
    }

    const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Scans `buf` once and reports what would need recoding.
///
/// Both CR and LF end a line for the purpose of measuring its length.
#[must_use]
pub fn need_recode(buf: &[u8]) -> Recode {
    let mut result = Recode::CLEAN;
    let mut line_len = 0usize;

    for &byte in buf {
        match byte {
            b'\r' | b'\n' => line_len = 0,
            _ => {
                line_len += 1;
                if byte >= 0x80 {
                    result = result.union(Recode::EIGHT_BIT);
                }
                if line_len > MAX_LINE_LENGTH {
                    result = result.union(Recode::LONG_LINES);
                }
            }
        }
        if result.bits() == 3 {
            break;
        }
    }

    result
}
