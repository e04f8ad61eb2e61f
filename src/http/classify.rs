//! Start-line classification of header blocks.
//!
//! A block qualifies only if every line is CRLF-terminated, no line carries a
//! bare `\r` or `\n`, and the block ends with the blank-line terminator.

use super::headers::{CRLF, HEADER_TERMINATOR};

/// Request methods accepted on either leg.
pub const METHODS: &[&[u8]] = &[
    b"GET", b"HEAD", b"POST", b"PUT", b"DELETE", b"CONNECT", b"OPTIONS", b"TRACE", b"PATCH",
];

/// Splits a head block into its lines, or `None` when the line structure is broken.
fn strict_lines(block: &[u8]) -> Option<Vec<&[u8]>> {
    let head = block.strip_suffix(HEADER_TERMINATOR)?;
    let mut lines = Vec::new();
    let mut rest = head;
    loop {
        let (line, next) = match super::headers::find(rest, CRLF) {
            Some(i) => (&rest[..i], Some(&rest[i + CRLF.len()..])),
            None => (rest, None),
        };
        if line.is_empty() || line.iter().any(|&b| b == b'\r' || b == b'\n') {
            return None;
        }
        lines.push(line);
        match next {
            Some(next) => rest = next,
            None => return Some(lines),
        }
    }
}

/// `HTTP/<digit>.<digit>`
fn is_version(token: &[u8]) -> bool {
    matches!(token, [b'H', b'T', b'T', b'P', b'/', major, b'.', minor]
        if major.is_ascii_digit() && minor.is_ascii_digit())
}

fn is_request_line(line: &[u8]) -> bool {
    let mut parts = line.split(|&b| b == b' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    METHODS.contains(&method)
        && !target.is_empty()
        && target.iter().all(|&b| (0x21..=0x7f).contains(&b))
        && is_version(version)
}

fn is_status_line(line: &[u8]) -> bool {
    let mut parts = line.splitn(3, |&b| b == b' ');
    let (Some(version), Some(status), Some(reason)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    is_version(version) && status.len() == 3 && status.iter().all(u8::is_ascii_digit) && !reason.is_empty()
}

/// Returns true if `block` is a well-formed request head.
pub fn is_request(block: &[u8]) -> bool {
    strict_lines(block).is_some_and(|lines| is_request_line(lines[0]))
}

/// Returns true if `block` is a well-formed response head.
pub fn is_response(block: &[u8]) -> bool {
    strict_lines(block).is_some_and(|lines| is_status_line(lines[0]))
}

/// Method token of a request head.
pub fn request_method(block: &[u8]) -> Option<&[u8]> {
    block.split(|&b| b == b' ').next().filter(|m| METHODS.contains(m))
}

/// Status code of a response head.
pub fn response_status(block: &[u8]) -> Option<u16> {
    let status = block.split(|&b| b == b' ').nth(1)?;
    std::str::from_utf8(status.get(..3)?).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_request() {
        assert!(is_request(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n"));
        assert!(is_request(b"POST / HTTP/1.0\r\n\r\n"));

        assert!(!is_request(b"GET /index.html HTTP/1.1\rHost: example.com\r\n\r\n"));
        assert!(!is_request(b"GET /index.html HTTP/1.1\nHost: example.com\r\n\r\n"));
        assert!(!is_request(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\r\n"));
        assert!(!is_request(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n"));
        assert!(!is_request(b"GET /index.html HTTP/1.1\r\nHost: example.com\r"));
        assert!(!is_request(b"GET/index.html HTTP/1.1\nHost: example.com\r\n\r\n"));
        assert!(!is_request(b"FETCH /index.html HTTP/1.1\r\n\r\n"));
        assert!(!is_request(b"GET  /index.html HTTP/1.1\r\n\r\n"));
        assert!(!is_request(b"GET /index.html HTTP/11\r\n\r\n"));
    }

    #[test]
    fn test_is_response() {
        assert!(is_response(b"HTTP/1.1 200 OK\r\nHost: example.com\r\n\r\n"));
        assert!(is_response(b"HTTP/1.1 404 Not Found\r\n\r\n"));

        assert!(!is_response(b"HTTP/1.1 200 OK\rHost: example.com\r\n\r\n"));
        assert!(!is_response(b"HTTP/1.1 200 OK\nHost: example.com\r\n\r\n"));
        assert!(!is_response(b"HTTP/1.1 200 OK\r\nHost: example.com\r\r\n"));
        assert!(!is_response(b"HTTP/1.1 200 OK\r\nHost: example.com\r\n"));
        assert!(!is_response(b"HTTP/1.1 200 OK\r\nHost: example.com\r"));
        assert!(!is_response(b"HTTP/1.1 a0 OK\nHost: example.com\r\n\r\n"));
        assert!(!is_response(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(!is_response(b"HTTP/1.1 200\r\n\r\n"));
        assert!(!is_response(b"HTTP/1.1 200 \r\n\r\n"));
    }

    #[test]
    fn test_start_line_fields() {
        assert_eq!(request_method(b"HEAD / HTTP/1.1\r\n\r\n"), Some(&b"HEAD"[..]));
        assert_eq!(request_method(b"BREW / HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response_status(b"HTTP/1.1 304 Not Modified\r\n\r\n"), Some(304));
    }
}
