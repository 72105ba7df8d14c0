//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
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
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DiscoveryKind;
    use crate::load_balancer::RuleKind;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [load_balancer]
            rule = "round_robin"

            [[discovery.instances]]
            service = "bookmark-service"
            host = "10.0.0.1"
            port = 8081

            [[discovery.instances]]
            service = "contact-service"
            host = "10.0.0.2"
            port = 8082
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.load_balancer.rule, RuleKind::RoundRobin);
        assert_eq!(config.discovery.kind, DiscoveryKind::Static);
        assert_eq!(config.discovery.instances.len(), 2);
        // untouched sections keep their defaults
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.upstreams.contact_service, "contact-service");
    }

    #[test]
    fn test_validation_error_surfaces() {
        let err = parse_config("[timeouts]\naggregate_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("timeouts.aggregate_ms"));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_config("[listener\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
