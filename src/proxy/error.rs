//! Errors that end a proxied connection.

use std::io;

use thiserror::Error;

use crate::http::FramingError;
use crate::resilience::timeouts::TimedOut;
use crate::whitelist::SplitError;

/// The relayed request cannot be matched to a withheld fragment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("request carries no X-Message-ID header")]
    MissingId,

    #[error("request carries {0} X-Message-ID headers")]
    DuplicateId(usize),

    #[error("no session for id {0:?}")]
    UnknownSession(String),
}

/// Every failure is terminal for the connection that detected it.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("bad request: {0}")]
    Request(#[source] FramingError),

    #[error("bad upstream response: {0}")]
    Response(#[source] FramingError),

    #[error("header whitelisting failed: {0}")]
    Whitelist(#[from] SplitError),

    #[error("correlation failed: {0}")]
    Correlation(#[from] CorrelationError),

    #[error("failed to connect to {addr}: {source}")]
    UpstreamDial {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("upstream I/O failed: {0}")]
    UpstreamIo(#[source] io::Error),

    #[error("client I/O failed: {0}")]
    ClientIo(#[source] io::Error),

    #[error(transparent)]
    Timeout(#[from] TimedOut),
}

impl ProxyError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Request(FramingError::HeaderTooLarge(_)) => "header_too_large",
            ProxyError::Request(_) => "malformed_request",
            ProxyError::Response(_) => "malformed_response",
            ProxyError::Whitelist(_) => "invalid_header",
            ProxyError::Correlation(_) => "correlation",
            ProxyError::UpstreamDial { .. } => "upstream_dial",
            ProxyError::UpstreamIo(_) => "upstream_io",
            ProxyError::ClientIo(_) => "client_io",
            ProxyError::Timeout(_) => "timeout",
        }
    }
}
