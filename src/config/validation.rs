//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that both upstream services can be resolved by discovery
//! - Validate value ranges (timeouts > 0, thresholds > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{DiscoveryKind, GatewayConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("timeouts.call_ms ({call_ms}) must not exceed timeouts.aggregate_ms ({aggregate_ms})")]
    CallExceedsDeadline { call_ms: u64, aggregate_ms: u64 },

    #[error(
        "timeouts.request_secs ({request_secs}s) must cover timeouts.aggregate_ms ({aggregate_ms})"
    )]
    RequestTimeoutBelowDeadline { request_secs: u64, aggregate_ms: u64 },

    #[error("upstreams.{0} must not be empty")]
    EmptyServiceName(&'static str),

    #[error("upstreams.bookmark_service and upstreams.contact_service must differ")]
    SameUpstream,

    #[error("discovery.base_url is not a valid URL: '{0}'")]
    InvalidDiscoveryUrl(String),

    #[error("duplicate static instance {host}:{port} for service '{service}'")]
    DuplicateInstance { service: String, host: String, port: u16 },

    #[error("health_check.path must start with '/': '{0}'")]
    InvalidPingPath(String),
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    let upstreams = &config.upstreams;
    if upstreams.bookmark_service.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName("bookmark_service"));
    }
    if upstreams.contact_service.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName("contact_service"));
    }
    if upstreams.bookmark_service == upstreams.contact_service {
        errors.push(ValidationError::SameUpstream);
    }

    let positive = [
        ("discovery.refresh_interval_ms", config.discovery.refresh_interval_ms),
        ("discovery.poll_timeout_ms", config.discovery.poll_timeout_ms),
        ("circuit_breaker.failure_threshold", u64::from(config.circuit_breaker.failure_threshold)),
        ("circuit_breaker.window_ms", config.circuit_breaker.window_ms),
        ("circuit_breaker.cooldown_ms", config.circuit_breaker.cooldown_ms),
        ("timeouts.call_ms", config.timeouts.call_ms),
        ("timeouts.aggregate_ms", config.timeouts.aggregate_ms),
        ("timeouts.request_secs", config.timeouts.request_secs),
        (
            "load_balancer.instance_failure_threshold",
            u64::from(config.load_balancer.instance_failure_threshold),
        ),
        ("load_balancer.max_active_requests", config.load_balancer.max_active_requests as u64),
        ("health_check.interval_ms", config.health_check.interval_ms),
        ("health_check.timeout_ms", config.health_check.timeout_ms),
        ("health_check.unhealthy_threshold", u64::from(config.health_check.unhealthy_threshold)),
        ("health_check.healthy_threshold", u64::from(config.health_check.healthy_threshold)),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::MustBePositive(field));
        }
    }

    if config.timeouts.call_ms > config.timeouts.aggregate_ms {
        errors.push(ValidationError::CallExceedsDeadline {
            call_ms: config.timeouts.call_ms,
            aggregate_ms: config.timeouts.aggregate_ms,
        });
    }

    // the outer request timeout must never pre-empt the degraded passport
    if config.timeouts.request_secs.saturating_mul(1_000) < config.timeouts.aggregate_ms {
        errors.push(ValidationError::RequestTimeoutBelowDeadline {
            request_secs: config.timeouts.request_secs,
            aggregate_ms: config.timeouts.aggregate_ms,
        });
    }

    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::InvalidPingPath(config.health_check.path.clone()));
    }

    match config.discovery.kind {
        DiscoveryKind::Http => {
            if url::Url::parse(&config.discovery.base_url).is_err() {
                errors.push(ValidationError::InvalidDiscoveryUrl(
                    config.discovery.base_url.clone(),
                ));
            }
        }
        DiscoveryKind::Static => {
            let mut seen = HashSet::new();
            for instance in &config.discovery.instances {
                if !seen.insert((&instance.service, &instance.host, instance.port)) {
                    errors.push(ValidationError::DuplicateInstance {
                        service: instance.service.clone(),
                        host: instance.host.clone(),
                        port: instance.port,
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
