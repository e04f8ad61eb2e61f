//! Forwarding pipelines.
//!
//! # Data Flow
//! ```text
//! Incoming leg (client → relay):
//!     read head → classify → split (whitelist) → tag X-Message-ID
//!     → read body → upstream.rs (relay at 127.0.0.1:local_out_port)
//!     → response back to client → next request
//!
//! Outgoing leg (relay → next hop, intermediary role only):
//!     read head → classify → read body → claim session by X-Message-ID
//!     → join withheld headers → upstream.rs (next hop)
//!     → response back to relay → next request
//! ```
//!
//! # Design Decisions
//! - One spawned task per accepted connection; request/response rounds on a
//!   connection are strictly sequential
//! - Configuration, rules and the session table are passed in through
//!   `ProxyContext`, never looked up globally
//! - Every failure ends the connection that saw it

pub mod error;
pub mod incoming;
pub mod outgoing;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

pub use error::{CorrelationError, ProxyError};

use crate::config::ProxyConfig;
use crate::http::bad_request;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::resilience::timeouts::deadline;
use crate::session::SessionTable;
use crate::whitelist::Whitelist;

/// Correlation header injected by the incoming leg and consumed by the outgoing leg.
pub const MESSAGE_ID_HEADER: &str = "X-Message-ID";

/// Everything a connection handler needs, shared by both legs.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    pub config: Arc<ProxyConfig>,
    pub whitelist: Arc<Whitelist>,
    pub sessions: Arc<SessionTable>,
}

impl ProxyContext {
    pub fn new(config: ProxyConfig, whitelist: Whitelist) -> Self {
        Self {
            config: Arc::new(config),
            whitelist: Arc::new(whitelist),
            sessions: Arc::new(SessionTable::new()),
        }
    }

    fn timeout(&self) -> Duration {
        self.config.connection_timeout()
    }

    fn whitelisting(&self) -> bool {
        self.config.whitelist.enabled
    }

    fn max_header_bytes(&self) -> usize {
        self.config.limits.max_header_bytes
    }
}

/// Which side of the relay a listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Incoming,
    Outgoing,
}

impl Leg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Incoming => "incoming",
            Leg::Outgoing => "outgoing",
        }
    }
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes the literal 400 response and hands back `error` to end the connection.
pub(crate) async fn reject<W>(writer: &mut W, ctx: &ProxyContext, leg: Leg, error: ProxyError) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    metrics::record_rejection(leg.as_str(), error.kind());
    tracing::debug!(leg = %leg, reason = error.kind(), error = %error, "Rejecting request");

    let response = bad_request();
    let write = async {
        writer.write_all(&response).await?;
        writer.flush().await
    };
    if let Ok(Err(e)) = deadline(ctx.timeout(), write).await {
        tracing::debug!(leg = %leg, error = %e, "Failed to deliver 400 response");
    }
    Err(error)
}

/// Accept loop for one leg.
#[derive(Debug)]
pub struct ProxyServer {
    ctx: ProxyContext,
    leg: Leg,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    pub fn new(ctx: ProxyContext, leg: Leg, tracker: ConnectionTracker) -> Self {
        Self { ctx, leg, tracker }
    }

    /// Accept connections until `shutdown` fires, one task per connection.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        let address = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();
        tracing::info!(leg = %self.leg, address = %address, "Leg accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(leg = %self.leg, "Leg stopped accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        metrics::record_connection_error(self.leg.as_str(), "accept");
                        tracing::error!(leg = %self.leg, error = %e, "Accept failed");
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let ctx = self.ctx.clone();
        let leg = self.leg;
        let guard = self.tracker.track();
        metrics::record_connection(leg.as_str());

        let span = tracing::info_span!(
            "connection",
            leg = %leg,
            connection_id = %guard.id(),
            peer_addr = %peer,
        );

        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;

                let result = match leg {
                    Leg::Incoming => incoming::serve(&ctx, stream).await,
                    Leg::Outgoing => outgoing::serve(&ctx, stream).await,
                };

                match result {
                    Ok(()) => tracing::debug!("Connection closed by peer"),
                    Err(e) => {
                        metrics::record_connection_error(leg.as_str(), e.kind());
                        match &e {
                            ProxyError::Correlation(_)
                            | ProxyError::UpstreamDial { .. }
                            | ProxyError::UpstreamIo(_)
                            | ProxyError::Response(_) => {
                                tracing::warn!(error = %e, kind = e.kind(), "Connection aborted")
                            }
                            _ => tracing::debug!(error = %e, kind = e.kind(), "Connection ended"),
                        }
                    }
                }
            }
            .instrument(span),
        );
    }
}
