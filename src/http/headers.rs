//! Raw header block editing.
//!
//! # Responsibilities
//! - Validate single header lines (RFC 7230 token name, single-space value grammar)
//! - Look up field values by case-insensitive name
//! - Add, replace and remove header lines without disturbing line order
//!
//! # Design Decisions
//! - Operates on raw bytes; lines are never re-serialized, only moved
//! - The start line is never treated as a header line
//! - Any body after the header terminator is re-attached untouched

use std::collections::HashSet;

/// CRLF line separator.
pub const CRLF: &[u8] = b"\r\n";

/// Blank-line terminator that ends every header block.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Which matching header lines an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Every line with a matching field name.
    All,
    /// Only the n-th matching line in document order (1-indexed).
    Nth(usize),
}

impl Occurrence {
    fn selects(self, counter: usize) -> bool {
        match self {
            Occurrence::All => true,
            Occurrence::Nth(n) => n == counter,
        }
    }
}

/// RFC 7230 `tchar`.
fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#'..=b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'..=b'`' | b'|' | b'~'
        | b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z')
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Returns true iff `line` is `token ":" [SP] value [SP]` with no run of
/// more than one space or tab anywhere in the value.
pub fn is_valid_header_line(line: &[u8]) -> bool {
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return false;
    };
    let (name, value) = (&line[..colon], &line[colon + 1..]);
    if name.is_empty() || !name.iter().all(|&b| is_token_byte(b)) {
        return false;
    }

    let mut previous_blank = false;
    for &b in value {
        if is_blank(b) {
            if previous_blank {
                return false;
            }
            previous_blank = true;
        } else if b >= 0x21 {
            previous_blank = false;
        } else {
            return false;
        }
    }
    true
}

/// Field name of a header line (bytes before the first colon).
pub fn field_name(line: &[u8]) -> Option<&[u8]> {
    line.iter().position(|&b| b == b':').map(|i| &line[..i])
}

/// Field value of a header line with surrounding blanks removed.
pub fn field_value(line: &[u8]) -> Option<&[u8]> {
    line.iter()
        .position(|&b| b == b':')
        .map(|i| trim_blanks(&line[i + 1..]))
}

fn trim_blanks(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}

fn name_matches(line: &[u8], name: &str) -> bool {
    field_name(line).is_some_and(|n| n.eq_ignore_ascii_case(name.as_bytes()))
}

/// A message split at its first header terminator.
#[derive(Debug, Clone, Copy)]
pub struct MessageParts<'a> {
    /// Start line and header lines, without the terminator.
    pub head: &'a [u8],
    /// Everything after the terminator.
    pub body: &'a [u8],
}

impl<'a> MessageParts<'a> {
    pub fn split(message: &'a [u8]) -> Self {
        match find(message, HEADER_TERMINATOR) {
            Some(i) => Self {
                head: &message[..i],
                body: &message[i + HEADER_TERMINATOR.len()..],
            },
            None => Self {
                head: message.strip_suffix(CRLF).unwrap_or(message),
                body: &[],
            },
        }
    }

    /// Start line followed by header lines.
    pub fn lines(&self) -> impl Iterator<Item = &'a [u8]> {
        split_lines(self.head)
    }

    /// Header lines only (the start line is skipped).
    pub fn header_lines(&self) -> impl Iterator<Item = &'a [u8]> {
        self.lines().skip(1)
    }

    /// Lower-cased names of all well-formed header lines.
    pub fn header_names(&self) -> HashSet<Vec<u8>> {
        self.header_lines()
            .filter(|line| is_valid_header_line(line))
            .filter_map(field_name)
            .map(|name| name.to_ascii_lowercase())
            .collect()
    }
}

/// Splits on CRLF, dropping empty lines.
pub fn split_lines(block: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(block);
    std::iter::from_fn(move || loop {
        let current = rest?;
        let line = match find(current, CRLF) {
            Some(i) => {
                rest = Some(&current[i + CRLF.len()..]);
                &current[..i]
            }
            None => {
                rest = None;
                current
            }
        };
        if !line.is_empty() {
            return Some(line);
        }
    })
}

/// Rebuilds a message from its lines and body.
pub fn assemble<'a>(lines: impl IntoIterator<Item = &'a [u8]>, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line);
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
    out.extend_from_slice(body);
    out
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Trimmed values of every header named `name`, in document order.
///
/// Structurally invalid lines are skipped.
pub fn field_values<'a>(block: &'a [u8], name: &str) -> Vec<&'a [u8]> {
    MessageParts::split(block)
        .header_lines()
        .filter(|line| is_valid_header_line(line) && name_matches(line, name))
        .filter_map(field_value)
        .collect()
}

/// Appends `name: value` immediately before the header terminator.
pub fn add_header(block: &[u8], name: &str, value: &str) -> Vec<u8> {
    let parts = MessageParts::split(block);
    let line = format!("{name}: {value}");
    assemble(
        parts.lines().chain(std::iter::once(line.as_bytes())),
        parts.body,
    )
}

/// Replaces the value of the selected `name` header lines.
pub fn set_header_value(block: &[u8], name: &str, value: &str, occurrence: Occurrence) -> Vec<u8> {
    let parts = MessageParts::split(block);
    let replacement = format!("{name}: {value}");
    let mut counter = 0;
    let lines: Vec<&[u8]> = parts
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i > 0 && name_matches(line, name) {
                counter += 1;
                if occurrence.selects(counter) {
                    return replacement.as_bytes();
                }
            }
            line
        })
        .collect();
    assemble(lines, parts.body)
}

/// Deletes the selected `name` header lines.
pub fn remove_header(block: &[u8], name: &str, occurrence: Occurrence) -> Vec<u8> {
    let parts = MessageParts::split(block);
    let mut counter = 0;
    let lines: Vec<&[u8]> = parts
        .lines()
        .enumerate()
        .filter(|(i, line)| {
            if *i > 0 && name_matches(line, name) {
                counter += 1;
                return !occurrence.selects(counter);
            }
            true
        })
        .map(|(_, line)| line)
        .collect();
    assemble(lines, parts.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_header_lines() {
        assert!(is_valid_header_line(b"Test: value"));
        assert!(is_valid_header_line(b"Test:value"));
        assert!(is_valid_header_line(b"Test:"));
        assert!(is_valid_header_line(
            b"Set-Cookie: id=123 expires=Sat, 15-Jul-2017 23:58:22 GMT; path=/; domain=x.com; httponly"
        ));

        assert!(!is_valid_header_line(b"Test:\r value"));
        assert!(!is_valid_header_line(b"Test:  value"));
        assert!(!is_valid_header_line(b"Test: a \t b"));
        assert!(!is_valid_header_line(b"Te st: value"));
        assert!(!is_valid_header_line(b": value"));
        assert!(!is_valid_header_line(b"no colon here"));
    }

    #[test]
    fn test_field_values() {
        let block = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: example\r\n\r\n";
        assert_eq!(field_values(block, "X-Test"), vec![&b"example"[..]]);

        let block = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: example1\r\nX-test: example2\r\n\r\n";
        assert_eq!(
            field_values(block, "x-TEST"),
            vec![&b"example1"[..], &b"example2"[..]]
        );

        assert!(field_values(block, "Missing").is_empty());
    }

    #[test]
    fn test_field_values_ignores_body() {
        let block = b"POST / HTTP/1.1\r\nContent-Length: 11\r\n\r\nX-Test: no\r\n";
        assert!(field_values(block, "X-Test").is_empty());
    }

    #[test]
    fn test_add_header() {
        let block = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert_eq!(
            add_header(block, "X-Test", "1234"),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: 1234\r\n\r\n"
        );

        let block = b"GET /index.html HTTP/1.1\r\nContent-Length: 3\r\nHost: example.com\r\n\r\n123";
        assert_eq!(
            add_header(block, "X-Test", "1234"),
            b"GET /index.html HTTP/1.1\r\nContent-Length: 3\r\nHost: example.com\r\nX-Test: 1234\r\n\r\n123"
        );
    }

    #[test]
    fn test_set_header_value() {
        let block = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: old\r\n\r\n123";
        assert_eq!(
            set_header_value(block, "X-Test", "new", Occurrence::Nth(1)),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: new\r\n\r\n123"
        );

        let block = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: old\r\nX-Test: old\r\nX-Test: old\r\n\r\n";
        assert_eq!(
            set_header_value(block, "X-Test", "new", Occurrence::Nth(2)),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: old\r\nX-Test: new\r\nX-Test: old\r\n\r\n"
        );
        assert_eq!(
            set_header_value(block, "X-Test", "new", Occurrence::All),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: new\r\nX-Test: new\r\nX-Test: new\r\n\r\n"
        );
    }

    #[test]
    fn test_remove_header() {
        let block = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: 1\r\nX-Test: 2\r\n\r\n";
        assert_eq!(
            remove_header(block, "X-Test", Occurrence::All),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n"
        );
        assert_eq!(
            remove_header(block, "X-Test", Occurrence::Nth(1)),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: 2\r\n\r\n"
        );
        assert_eq!(
            remove_header(block, "x-test", Occurrence::Nth(2)),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: 1\r\n\r\n"
        );
    }

    #[test]
    fn test_remove_header_keeps_body() {
        let block = b"POST / HTTP/1.1\r\nContent-Length: 4\r\nX-Test: 1\r\n\r\nbody";
        assert_eq!(
            remove_header(block, "X-Test", Occurrence::All),
            b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody"
        );
    }

    #[test]
    fn test_start_line_is_never_a_header() {
        let block = b"X-Test: looks-like-a-header\r\nX-Test: 1\r\n\r\n";
        assert_eq!(
            remove_header(block, "X-Test", Occurrence::All),
            b"X-Test: looks-like-a-header\r\n\r\n"
        );
    }
}
