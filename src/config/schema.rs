//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::load_balancer::RuleKind;

/// Root configuration for the passport gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public listener configuration.
    pub listener: ListenerConfig,

    /// Logical service names of the two upstream record services.
    pub upstreams: UpstreamsConfig,

    /// Discovery collaborator and registry refresh settings.
    pub discovery: DiscoveryConfig,

    /// Instance selection settings.
    pub load_balancer: LoadBalancerConfig,

    /// Ping (active health check) settings.
    pub health_check: HealthCheckConfig,

    /// Per-dependency circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream dependency wiring.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamsConfig {
    /// Logical service backing the bookmark lookup.
    pub bookmark_service: String,

    /// Logical service backing the contact lookup.
    pub contact_service: String,
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            bookmark_service: "bookmark-service".to_string(),
            contact_service: "contact-service".to_string(),
        }
    }
}

/// Which discovery collaborator feeds the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryKind {
    /// Endpoints listed in this file.
    #[default]
    Static,
    /// Remote registry queried over HTTP.
    Http,
}

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub kind: DiscoveryKind,

    /// Base URL of the HTTP registry (only for `kind = "http"`).
    pub base_url: String,

    /// How often the registry is refreshed, in milliseconds.
    pub refresh_interval_ms: u64,

    /// Upper bound for a single discovery poll, in milliseconds.
    pub poll_timeout_ms: u64,

    /// Static endpoints (only for `kind = "static"`).
    pub instances: Vec<StaticInstanceConfig>,
}

impl DiscoveryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            kind: DiscoveryKind::Static,
            base_url: "http://127.0.0.1:8761".to_string(),
            refresh_interval_ms: 30_000,
            poll_timeout_ms: 2_000,
            instances: Vec::new(),
        }
    }
}

/// A statically configured endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StaticInstanceConfig {
    /// Logical service this endpoint implements.
    pub service: String,

    pub host: String,

    pub port: u16,
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Selection rule applied to the filtered candidates.
    pub rule: RuleKind,

    /// Consecutive failed calls through one instance before it is tripped.
    pub instance_failure_threshold: u32,

    /// How long a tripped instance is skipped, in milliseconds.
    pub instance_trip_cooldown_ms: u64,

    /// In-flight request limit per instance (availability filtering only).
    pub max_active_requests: usize,
}

impl LoadBalancerConfig {
    pub fn instance_trip_cooldown(&self) -> Duration {
        Duration::from_millis(self.instance_trip_cooldown_ms)
    }
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            rule: RuleKind::AvailabilityFiltering,
            instance_failure_threshold: 3,
            instance_trip_cooldown_ms: 10_000,
            max_active_requests: 1_000,
        }
    }
}

/// Health check (ping) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable periodic pings.
    pub enabled: bool,

    /// Ping interval in milliseconds.
    pub interval_ms: u64,

    /// Ping timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe on every instance.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            timeout_ms: 2_000,
            path: "/health".to_string(),
            unhealthy_threshold: 2,
            healthy_threshold: 1,
        }
    }
}

/// Circuit breaker configuration, shared by every dependency breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Sliding window for the failure streak, in milliseconds.
    pub window_ms: u64,

    /// Time spent OPEN before a trial call is allowed, in milliseconds.
    pub cooldown_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_ms: 10_000,
            cooldown_ms: 5_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on one upstream call (connect, head and body), in milliseconds.
    pub call_ms: u64,

    /// Overall deadline for one aggregation, in milliseconds.
    pub aggregate_ms: u64,

    /// Outer request timeout enforced by the HTTP layer, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn call(&self) -> Duration {
        Duration::from_millis(self.call_ms)
    }

    pub fn aggregate(&self) -> Duration {
        Duration::from_millis(self.aggregate_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_ms: 1_000,
            aggregate_ms: 2_000,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
