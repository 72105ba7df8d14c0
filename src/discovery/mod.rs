//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! refresher.rs (fixed interval, own lifecycle)
//!     → Discovery::list_instances(service) for each configured service
//!         - static_list.rs (endpoints from the config file)
//!         - http.rs (remote registry over HTTP)
//!     → registry.rs (de-duplicate, reuse known instances, atomic swap)
//!
//! Readers (load balancer):
//!     registry.lookup(service) → lock-free snapshot read
//! ```
//!
//! # Design Decisions
//! - A failed poll never empties the registry: stale beats unavailable
//! - Snapshots are immutable and swapped whole via arc-swap
//! - Instances survive refreshes so health state is not lost

pub mod http;
pub mod refresher;
pub mod registry;
pub mod static_list;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpDiscovery;
pub use refresher::{RefresherHandle, RegistryRefresher};
pub use registry::InstanceRegistry;
pub use static_list::StaticDiscovery;

/// A network endpoint as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, bracketing bare IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

/// Errors from a discovery collaborator.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("discovery returned status {status} for service '{service}'")]
    Status { service: String, status: u16 },

    #[error("invalid discovery URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Source of truth for which endpoints implement a logical service.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Current endpoints for `service`. An empty list is a valid answer.
    async fn list_instances(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError>;
}
