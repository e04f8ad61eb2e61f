//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect conflicting port assignments
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ProxyConfig, ProxyRole};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be non-zero")]
    Zero(&'static str),

    #[error("relay.local_in_port and relay.local_out_port are both {0}")]
    PortConflict(u16),

    #[error("relay.next_hop_address {0:?} must be host:port")]
    InvalidNextHop(String),

    #[error("whitelist.rules_path must be set when whitelisting is enabled")]
    MissingRules,
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Checks `config` and reports every violation found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.incoming_address", &config.listener.incoming_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }

    if config.relay.local_out_port == 0 {
        errors.push(ValidationError::Zero("relay.local_out_port"));
    }
    if config.role == ProxyRole::Intermediary {
        let relay = &config.relay;
        if relay.local_in_port != 0 && relay.local_in_port == relay.local_out_port {
            errors.push(ValidationError::PortConflict(relay.local_in_port));
        }
        let has_port = relay
            .next_hop_address
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !has_port {
            errors.push(ValidationError::InvalidNextHop(relay.next_hop_address.clone()));
        }
    }

    if config.whitelist.enabled && config.whitelist.rules_path.trim().is_empty() {
        errors.push(ValidationError::MissingRules);
    }

    if config.timeouts.connection_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connection_secs"));
    }
    if config.limits.max_header_bytes == 0 {
        errors.push(ValidationError::Zero("limits.max_header_bytes"));
    }

    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
