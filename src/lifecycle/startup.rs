//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind both legs' listeners in dependency order
//! - Spawn one accept loop per leg
//! - Hand back a handle that can stop and drain everything
//!
//! # Design Decisions
//! - Fail fast: any bind error is fatal
//! - The outgoing leg binds first (traffic reaches it only through the relay,
//!   which in turn is reached only through the incoming leg)
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{ProxyConfig, ProxyRole};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::proxy::{Leg, ProxyContext, ProxyServer};
use crate::session::SessionTable;
use crate::whitelist::Whitelist;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{leg} leg: {source}")]
    Listener {
        leg: Leg,
        #[source]
        source: ListenerError,
    },

    #[error("{leg} leg has no local address: {source}")]
    LocalAddr {
        leg: Leg,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to a started proxy.
#[derive(Debug)]
pub struct RunningProxy {
    incoming_addr: SocketAddr,
    outgoing_addr: Option<SocketAddr>,
    sessions: Arc<SessionTable>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    tasks: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl RunningProxy {
    pub fn incoming_addr(&self) -> SocketAddr {
        self.incoming_addr
    }

    /// `None` in the origin role, where no outgoing leg runs.
    pub fn outgoing_addr(&self) -> Option<SocketAddr> {
        self.outgoing_addr
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// Stop accepting, then wait up to the grace period for open connections.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down");
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Accept loop failed");
            }
        }

        let remaining = self.tracker.drain(self.grace).await;
        if remaining > 0 {
            tracing::warn!(connections = remaining, "Grace period elapsed with connections open");
        }
        tracing::info!("Shutdown complete");
    }
}

async fn bind(leg: Leg, addr: &str, max_connections: usize) -> Result<(Listener, SocketAddr), StartupError> {
    let listener = Listener::bind(addr, max_connections)
        .await
        .map_err(|source| StartupError::Listener { leg, source })?;
    let local = listener
        .local_addr()
        .map_err(|source| StartupError::LocalAddr { leg, source })?;
    Ok((listener, local))
}

/// Bind the legs for `config.role` and start serving.
pub async fn start(config: ProxyConfig, whitelist: Whitelist) -> Result<RunningProxy, StartupError> {
    let ctx = ProxyContext::new(config, whitelist);
    let config = Arc::clone(&ctx.config);
    let max_connections = config.listener.max_connections;

    let shutdown = Shutdown::new();
    let tracker = ConnectionTracker::new();

    let outgoing = match config.role {
        ProxyRole::Intermediary => Some(bind(Leg::Outgoing, &config.outgoing_listen_address(), max_connections).await?),
        ProxyRole::Origin => None,
    };
    let (incoming, incoming_addr) = bind(Leg::Incoming, &config.listener.incoming_address, max_connections).await?;

    let mut tasks = Vec::with_capacity(2);
    let mut outgoing_addr = None;
    if let Some((listener, addr)) = outgoing {
        let server = ProxyServer::new(ctx.clone(), Leg::Outgoing, tracker.clone());
        tasks.push(tokio::spawn(server.run(listener, shutdown.subscribe())));
        outgoing_addr = Some(addr);
    }
    let server = ProxyServer::new(ctx.clone(), Leg::Incoming, tracker.clone());
    tasks.push(tokio::spawn(server.run(incoming, shutdown.subscribe())));

    tracing::info!(
        role = ?config.role,
        incoming = %incoming_addr,
        outgoing = ?outgoing_addr,
        relay = %config.relay_address(),
        next_hop = %config.relay.next_hop_address,
        whitelisting = config.whitelist.enabled,
        rules = ctx.whitelist.rules().len(),
        "Proxy started"
    );

    Ok(RunningProxy {
        incoming_addr,
        outgoing_addr,
        sessions: Arc::clone(&ctx.sessions),
        shutdown,
        tracker,
        tasks,
        grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
    })
}
