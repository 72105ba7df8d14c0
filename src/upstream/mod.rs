//! Upstream call subsystem.
//!
//! # Data Flow
//! ```text
//! Dependency branch
//!     → client.rs (build GET against the selected instance)
//!     → per-call timeout around connect + head + body
//!     → classify: 2xx + JSON → Ok, elapsed → Timeout, anything else → Dependency
//!     → report outcome to the instance's passive health
//! ```
//!
//! # Design Decisions
//! - No retries at this layer; failure classification stays unambiguous
//! - Every error is absorbed by the circuit breaker, never shown to callers

pub mod client;

use std::time::Duration;

use thiserror::Error;

pub use client::UpstreamClient;

/// Why a dependency call produced no usable value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The registry has no instance for the service.
    #[error("no instances known for service '{service}'")]
    Resolution { service: String },

    /// Every known instance was filtered out as unhealthy, tripped or saturated.
    #[error("no available instance for service '{service}' ({known} known)")]
    NoAvailableInstance { service: String, known: usize },

    /// The call exceeded its bound.
    #[error("call to {target} timed out after {after:?}")]
    Timeout { target: String, after: Duration },

    /// The instance answered, or failed to, in an unusable way.
    #[error("call to {target} failed: {reason}")]
    Dependency { target: String, reason: DependencyFailure },
}

impl UpstreamError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Resolution { .. } => "resolution",
            UpstreamError::NoAvailableInstance { .. } => "no_available_instance",
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Dependency { .. } => "dependency",
        }
    }
}

/// Detail of a `UpstreamError::Dependency`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyFailure {
    #[error("non-success status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unreadable body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    Request(String),
}
