//! Per-connection upstream link.
//!
//! Each client connection owns exactly one upstream connection, dialed on
//! the first request and reused for every keep-alive round after it.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::error::ProxyError;
use crate::http::classify::{is_response, response_status};
use crate::http::framing::{read_body, read_header_block, response_has_body, FramingError};
use crate::resilience::timeouts::deadline;

#[derive(Debug)]
struct Link {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Lazily dialed connection to the relay or next hop.
#[derive(Debug)]
pub struct Upstream {
    addr: String,
    timeout: Duration,
    max_header_bytes: usize,
    link: Option<Link>,
}

impl Upstream {
    pub fn new(addr: impl Into<String>, timeout: Duration, max_header_bytes: usize) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            max_header_bytes,
            link: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn dial(&self) -> Result<Link, ProxyError> {
        let stream = deadline(self.timeout, TcpStream::connect(&self.addr))
            .await?
            .map_err(|source| ProxyError::UpstreamDial {
                addr: self.addr.clone(),
                source,
            })?;
        tracing::debug!(upstream = %self.addr, "Upstream connected");
        let (read_half, writer) = stream.into_split();
        Ok(Link {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    /// Sends `request` and returns the complete response.
    ///
    /// `method` decides whether the response can carry a body; `strip_length`
    /// drops `Content-Length` from chunked responses.
    pub async fn exchange(
        &mut self,
        request: &[u8],
        method: Option<&[u8]>,
        strip_length: bool,
    ) -> Result<Vec<u8>, ProxyError> {
        let link = match self.link.take() {
            Some(link) => link,
            None => self.dial().await?,
        };
        let link = self.link.insert(link);
        let timeout = self.timeout;

        deadline(timeout, async {
            link.writer.write_all(request).await?;
            link.writer.flush().await
        })
        .await?
        .map_err(ProxyError::UpstreamIo)?;

        let head = deadline(timeout, read_header_block(&mut link.reader, self.max_header_bytes))
            .await?
            .map_err(ProxyError::Response)?;
        if !is_response(&head) {
            return Err(ProxyError::Response(FramingError::MalformedHead));
        }

        if !response_has_body(method, response_status(&head)) {
            return Ok(head);
        }
        let response = deadline(timeout, read_body(head, &mut link.reader, strip_length))
            .await?
            .map_err(ProxyError::Response)?;
        Ok(response)
    }
}
