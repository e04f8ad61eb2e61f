//! Locally generated responses.

/// Builds a complete response whose `Content-Length` matches `body`.
pub fn create_response(code: u16, reason: &str, body: &[u8]) -> Vec<u8> {
    let mut response =
        format!("HTTP/1.1 {code} {reason}\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
    response.extend_from_slice(body);
    response
}

/// The only response this proxy ever originates.
pub fn bad_request() -> Vec<u8> {
    create_response(400, "Bad Request", b"Bad Request")
}
