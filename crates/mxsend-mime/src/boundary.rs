//! Multipart delimiter search.

use crate::content_type::Boundary;

/// One delimiter line found in a multipart body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    /// Offset of the leading `--`.
    pub start: usize,
    /// Offset right behind the boundary value.
    pub end: usize,
    /// The boundary is followed by `--`.
    pub close: bool,
}

const fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

/// Finds the next delimiter in `buf` whose preceding line break is at or
/// after `from`.
///
/// A delimiter is a CR or LF followed by `--`, the boundary, and then either
/// whitespace or `--` at the end of the data or before whitespace. Delimiters
/// that end exactly at the end of `buf` are not recognised.
#[must_use]
pub fn find_delimiter(buf: &[u8], from: usize, boundary: Boundary<'_>) -> Option<Delimiter> {
    let boundary = boundary.as_bytes();
    let last = buf.len().checked_sub(boundary.len() + 3)?;

    (from..last).find_map(|pos| {
        if !matches!(buf[pos], b'\r' | b'\n') {
            return None;
        }
        let start = pos + 1;
        let end = start + 2 + boundary.len();
        if &buf[start..start + 2] != b"--" || &buf[start + 2..end] != boundary {
            return None;
        }
        match &buf[end..] {
            [next, ..] if is_space(*next) => Some(Delimiter {
                start,
                end,
                close: false,
            }),
            [b'-', b'-'] => Some(Delimiter {
                start,
                end,
                close: true,
            }),
            [b'-', b'-', next, ..] if is_space(*next) => Some(Delimiter {
                start,
                end,
                close: true,
            }),
            _ => None,
        }
    })
}

/// Where to resume the delimiter search for data starting at `pos`.
///
/// Includes the line break just before `pos` so that a delimiter opening the
/// data is still found.
#[must_use]
pub fn search_origin(buf: &[u8], pos: usize) -> usize {
    match pos.checked_sub(1).and_then(|prev| buf.get(prev)) {
        Some(b'\r' | b'\n') => pos - 1,
        _ => pos,
    }
}

/// Number of transport padding bytes at `pos`: blanks followed by an optional
/// CR and an optional LF.
#[must_use]
pub fn skip_padding(buf: &[u8], pos: usize) -> usize {
    let rest = buf.get(pos..).unwrap_or_default();
    let mut len = rest
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count();
    if rest.get(len) == Some(&b'\r') {
        len += 1;
    }
    if rest.get(len) == Some(&b'\n') {
        len += 1;
    }
    len
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn xyz() -> Boundary<'static> {
        Boundary::new(b"xyz").unwrap()
    }

    mod find_tests {
        use super::*;

        #[test]
        fn after_crlf() {
            let body = b"\r\npreamble\r\n--xyz\r\npart";
            let delim = find_delimiter(body, 0, xyz()).unwrap();
            assert_eq!(delim.start, 12);
            assert_eq!(delim.end, 17);
            assert!(!delim.close);
            assert_eq!(&body[delim.start..delim.end], b"--xyz");
        }

        #[test]
        fn close_delimiter() {
            let body = b"\n--xyz--\r\nepilogue";
            let delim = find_delimiter(body, 0, xyz()).unwrap();
            assert!(delim.close);
            assert_eq!(delim.end, 6);
        }

        #[test]
        fn close_delimiter_at_end() {
            let delim = find_delimiter(b"\n--xyz--", 0, xyz()).unwrap();
            assert!(delim.close);
        }

        #[test]
        fn longer_boundary_is_no_match() {
            assert_eq!(find_delimiter(b"\r\n--xyzz\r\n", 0, xyz()), None);
            assert_eq!(find_delimiter(b"\r\n--xyz-\r\n", 0, xyz()), None);
            assert_eq!(find_delimiter(b"\r\n--xyz--x\r\n", 0, xyz()), None);
        }

        #[test]
        fn needs_line_break_before() {
            assert_eq!(find_delimiter(b"text --xyz\r\n", 0, xyz()), None);
        }

        #[test]
        fn not_at_end_of_data() {
            assert_eq!(find_delimiter(b"\r\n--xyz", 0, xyz()), None);
        }

        #[test]
        fn trailing_padding() {
            let delim = find_delimiter(b"\r\n--xyz \t\r\n", 0, xyz()).unwrap();
            assert!(!delim.close);
        }

        #[test]
        fn starts_search_at_offset() {
            let body = b"\n--xyz\nA\n--xyz--\n";
            let first = find_delimiter(body, 0, xyz()).unwrap();
            let second = find_delimiter(body, first.end, xyz()).unwrap();
            assert_eq!(second.start, 9);
            assert!(second.close);
        }

        #[test]
        fn short_buffer() {
            assert_eq!(find_delimiter(b"--", 0, xyz()), None);
        }
    }

    mod padding_tests {
        use super::*;

        #[test]
        fn blanks_and_crlf() {
            assert_eq!(skip_padding(b"--xyz \t \r\nnext", 5), 5);
        }

        #[test]
        fn bare_lf() {
            assert_eq!(skip_padding(b"\nnext", 0), 1);
        }

        #[test]
        fn stops_at_text() {
            assert_eq!(skip_padding(b"  junk\r\n", 0), 2);
        }

        #[test]
        fn only_one_line_break() {
            assert_eq!(skip_padding(b"\r\n\r\n", 0), 2);
        }

        #[test]
        fn past_end() {
            assert_eq!(skip_padding(b"ab", 5), 0);
        }
    }

    #[test]
    fn origin_includes_previous_line_break() {
        let body = b"\n--xyz\n--xyz--\n";
        assert_eq!(search_origin(body, 7), 6);
        assert_eq!(search_origin(body, 0), 0);
        assert_eq!(search_origin(b"ab", 1), 1);
    }
}
