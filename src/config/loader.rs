//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProxyRole;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            role = "origin"

            [listener]
            incoming_address = "127.0.0.1:7000"

            [relay]
            local_out_port = 7001
            local_in_port = 7002
            next_hop_address = "10.0.0.2:7000"

            [whitelist]
            enabled = false

            [timeouts]
            connection_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.role, ProxyRole::Origin);
        assert_eq!(config.listener.incoming_address, "127.0.0.1:7000");
        assert_eq!(config.relay_address(), "127.0.0.1:7001");
        assert_eq!(config.outgoing_listen_address(), "127.0.0.1:7002");
        assert!(!config.whitelist.enabled);
        assert_eq!(config.connection_timeout().as_secs(), 3);
        // untouched sections keep their defaults
        assert_eq!(config.listener.max_connections, 10_000);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.role, ProxyRole::Intermediary);
        assert!(config.whitelist.enabled);
    }

    #[test]
    fn test_rejects_unknown_role() {
        let err = parse_config(r#"role = "gateway""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_surfaces_validation_errors() {
        let err = parse_config("[timeouts]\nconnection_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("timeouts.connection_secs"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("hwl-proxy-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[relay]\nlocal_out_port = 9100\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.relay.local_out_port, 9100);

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
