//! HTTP/1.1 message framing.
//!
//! # Responsibilities
//! - Read exactly one header block from a buffered stream
//! - Decide body framing from `Transfer-Encoding` / `Content-Length`
//! - Read exactly the body bytes, keeping chunk envelopes verbatim
//!
//! # Design Decisions
//! - Never reads past the end of the current message, so keep-alive
//!   streams stay byte-aligned
//! - Chunk sizes are decimal
//! - Any framing failure is terminal; there is no resynchronization

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::headers::{field_values, remove_header, Occurrence, CRLF, HEADER_TERMINATOR};

/// Errors produced while framing a message.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The stream ended before the message was complete.
    #[error("stream ended before the message was complete")]
    IncompleteStream,

    /// The header block grew beyond the configured limit.
    #[error("header block exceeds {0} bytes")]
    HeaderTooLarge(usize),

    /// The header block is not a well-formed request or response head.
    #[error("malformed start line or header block")]
    MalformedHead,

    /// `Content-Length` is not a non-negative integer.
    #[error("invalid Content-Length value {0:?}")]
    InvalidContentLength(String),

    /// Several `Content-Length` headers disagree.
    #[error("conflicting Content-Length values")]
    ConflictingContentLength,

    /// A chunk-size line does not parse.
    #[error("invalid chunk size line {0:?}")]
    InvalidChunkSize(String),

    /// A chunk-size or trailer line grew beyond the limit.
    #[error("chunk line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Chunk data is not followed by CRLF.
    #[error("chunk data not terminated by CRLF")]
    MalformedChunk,

    /// Underlying read failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// True when the peer simply went away rather than sending garbage.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, FramingError::IncompleteStream | FramingError::Io(_))
    }
}

/// How the body of a message is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    None,
    ContentLength(usize),
    Chunked,
}

/// Longest accepted chunk-size or trailer line.
pub const CHUNK_LINE_LIMIT: usize = 4096;

/// Largest accepted trailer section after the zero chunk.
pub const TRAILER_LIMIT: usize = 64 * 1024;

/// Outcome of a bounded line read.
enum Line {
    Complete,
    TooLong,
}

/// Appends one `\n`-terminated line to `out` without letting `out` grow
/// past `limit` bytes.
async fn read_line_bounded<R>(reader: &mut R, out: &mut Vec<u8>, limit: usize) -> Result<Line, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let budget = limit.saturating_add(1).saturating_sub(out.len());
    if budget == 0 {
        return Ok(Line::TooLong);
    }
    let read = (&mut *reader).take(budget as u64).read_until(b'\n', out).await?;
    if out.len() > limit {
        return Ok(Line::TooLong);
    }
    if read > 0 && out.ends_with(b"\n") {
        return Ok(Line::Complete);
    }
    Err(FramingError::IncompleteStream)
}

/// Reads up to and including the first `\r\n\r\n`.
///
/// Never buffers more than `max_bytes`, even if the peer never sends a newline.
pub async fn read_header_block<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut block = Vec::new();
    loop {
        if let Line::TooLong = read_line_bounded(reader, &mut block, max_bytes).await? {
            return Err(FramingError::HeaderTooLarge(max_bytes));
        }
        if block.ends_with(HEADER_TERMINATOR) {
            return Ok(block);
        }
    }
}

/// Reads one CRLF-terminated line of at most `limit` bytes.
async fn read_crlf_line<R>(reader: &mut R, limit: usize) -> Result<Vec<u8>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        if let Line::TooLong = read_line_bounded(reader, &mut line, limit).await? {
            return Err(FramingError::LineTooLong(limit));
        }
        if line.ends_with(CRLF) {
            return Ok(line);
        }
    }
}

/// Appends exactly `len` bytes to `out`; memory grows only as bytes arrive.
async fn read_exact_into<R>(reader: &mut R, out: &mut Vec<u8>, len: usize) -> Result<(), FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let read = (&mut *reader).take(len as u64).read_to_end(out).await?;
    if read < len {
        return Err(FramingError::IncompleteStream);
    }
    Ok(())
}

/// Reads exactly `len` body bytes.
pub async fn read_exact_body<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    read_exact_into(reader, &mut body, len).await?;
    Ok(body)
}

/// Strict decimal: ASCII digits only, no sign, no surrounding junk.
fn parse_decimal(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, FramingError> {
    let invalid = || FramingError::InvalidChunkSize(String::from_utf8_lossy(line).into_owned());
    let digits = line.strip_suffix(CRLF).unwrap_or(line).trim_ascii();
    let size = parse_decimal(digits).ok_or_else(invalid)?;
    // the data is followed by its CRLF
    size.checked_add(CRLF.len()).ok_or_else(invalid)?;
    Ok(size)
}

/// Reads a chunked body, returning size lines, data and terminators verbatim.
pub async fn read_chunked_body<R>(reader: &mut R) -> Result<Vec<u8>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let size_line = read_crlf_line(reader, CHUNK_LINE_LIMIT).await?;
        let size = parse_chunk_size(&size_line)?;
        body.extend_from_slice(&size_line);

        if size == 0 {
            // trailer section, up to and including the blank line
            let mut trailers = 0;
            loop {
                let line = read_crlf_line(reader, CHUNK_LINE_LIMIT).await?;
                trailers += line.len();
                if trailers > TRAILER_LIMIT {
                    return Err(FramingError::LineTooLong(TRAILER_LIMIT));
                }
                body.extend_from_slice(&line);
                if line == CRLF {
                    return Ok(body);
                }
            }
        }

        read_exact_into(reader, &mut body, size).await?;
        read_exact_into(reader, &mut body, CRLF.len()).await?;
        if !body.ends_with(CRLF) {
            return Err(FramingError::MalformedChunk);
        }
    }
}

/// Determines body framing from the headers of `block`.
pub fn body_framing(block: &[u8]) -> Result<BodyFraming, FramingError> {
    let chunked = field_values(block, "Transfer-Encoding")
        .first()
        .is_some_and(|te| te.eq_ignore_ascii_case(b"chunked"));
    if chunked {
        return Ok(BodyFraming::Chunked);
    }

    let mut length = None;
    for value in field_values(block, "Content-Length") {
        let parsed = parse_decimal(value)
            .ok_or_else(|| FramingError::InvalidContentLength(String::from_utf8_lossy(value).into_owned()))?;
        match length {
            Some(previous) if previous != parsed => return Err(FramingError::ConflictingContentLength),
            _ => length = Some(parsed),
        }
    }
    Ok(length.map_or(BodyFraming::None, BodyFraming::ContentLength))
}

/// Whether a response with `status` to a request with `method` carries a body.
pub fn response_has_body(method: Option<&[u8]>, status: Option<u16>) -> bool {
    if method == Some(b"HEAD".as_slice()) {
        return false;
    }
    !matches!(status, Some(100..=199 | 204 | 304))
}

/// Reads the body announced by `block` and returns the complete message.
///
/// With `strip_length` set, a chunked message loses any `Content-Length`
/// header so the forwarded framing is unambiguous.
pub async fn read_body<R>(block: Vec<u8>, reader: &mut R, strip_length: bool) -> Result<Vec<u8>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    match body_framing(&block)? {
        BodyFraming::None => Ok(block),
        BodyFraming::ContentLength(len) => {
            if block.len().checked_add(len).is_none() {
                return Err(FramingError::InvalidContentLength(len.to_string()));
            }
            let mut message = block;
            read_exact_into(reader, &mut message, len).await?;
            Ok(message)
        }
        BodyFraming::Chunked => {
            let mut message = if strip_length {
                remove_header(&block, "Content-Length", Occurrence::All)
            } else {
                block
            };
            message.extend(read_chunked_body(reader).await?);
            Ok(message)
        }
    }
}
