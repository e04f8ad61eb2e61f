//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// What sits behind this instance's incoming leg.
    pub role: ProxyRole,

    /// Client-facing listener.
    pub listener: ListenerConfig,

    /// Local relay ports and next hop.
    pub relay: RelayConfig,

    /// Header whitelisting settings.
    pub whitelist: WhitelistConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Message size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Address the incoming leg dials to reach the local relay.
    pub fn relay_address(&self) -> String {
        format!("127.0.0.1:{}", self.relay.local_out_port)
    }

    /// Address the outgoing leg listens on for the relay's connections.
    pub fn outgoing_listen_address(&self) -> String {
        format!("127.0.0.1:{}", self.relay.local_in_port)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.connection_secs)
    }
}

/// Next hop of the incoming leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyRole {
    /// The next hop is the origin server; no session correlation.
    Origin,
    /// A relay sits between the incoming and outgoing legs.
    #[default]
    Intermediary,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address for the incoming leg (e.g., "0.0.0.0:8080").
    pub incoming_address: String,

    /// Maximum concurrent connections per listener (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            incoming_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Relay wiring.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Loopback port the relay accepts the incoming leg's connections on.
    pub local_out_port: u16,

    /// Loopback port the outgoing leg listens on; 0 picks an ephemeral port.
    pub local_in_port: u16,

    /// Address the outgoing leg forwards to (next intermediary or origin).
    pub next_hop_address: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            local_out_port: 8081,
            local_in_port: 8082,
            next_hop_address: "127.0.0.1:9000".to_string(),
        }
    }
}

/// Whitelisting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Toggle for the whole split/rejoin path.
    pub enabled: bool,

    /// JSON rule list.
    pub rules_path: String,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules_path: "whitelist.json".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle deadline for every read or write, client-facing and upstream.
    pub connection_secs: u64,

    /// How long shutdown waits for live connections to finish.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connection_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Message limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted header block in bytes.
    pub max_header_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable output.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
