//! Service instance abstraction.
//!
//! # Responsibilities
//! - Represent one reachable endpoint of a logical service
//! - Track in-flight requests (least-active and availability rules)
//! - Carry ping health and passive trip state

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

use crate::discovery::Endpoint;
use crate::health::passive::PassiveHealth;
use crate::health::state::{HealthState, PingState};

/// One endpoint of a logical service.
///
/// Identity (service, endpoint) is fixed at creation; only the interior
/// health and load counters change.
#[derive(Debug)]
pub struct ServiceInstance {
    /// Logical service name.
    pub service: String,
    /// Host and port as reported by discovery.
    pub endpoint: Endpoint,
    /// Pre-calculated base URL for performance.
    pub base_url: Url,
    /// Number of requests currently in flight.
    active_requests: AtomicUsize,
    /// Ping-driven health.
    pub ping: PingState,
    /// Call-outcome-driven trip state.
    pub passive: PassiveHealth,
}

impl ServiceInstance {
    pub fn new(service: impl Into<String>, endpoint: Endpoint) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&format!("http://{}", endpoint.authority()))?;
        Ok(Self {
            service: service.into(),
            endpoint,
            base_url,
            active_requests: AtomicUsize::new(0),
            ping: PingState::default(),
            passive: PassiveHealth::default(),
        })
    }

    /// `host:port` form used in logs, metrics and request URIs.
    pub fn authority(&self) -> String {
        self.endpoint.authority()
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> HealthState {
        self.ping.current()
    }

    /// Selectable: not failing pings and not tripped.
    pub fn is_available(&self) -> bool {
        self.ping.is_healthy() && !self.passive.is_tripped()
    }

    /// Mark a request as started; the count drops when the guard does.
    pub fn begin_request(self: &Arc<Self>) -> InFlightGuard {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            instance: Arc::clone(self),
        }
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.service, self.endpoint.authority())
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct InFlightGuard {
    instance: Arc<ServiceInstance>,
}

impl InFlightGuard {
    pub fn instance(&self) -> &Arc<ServiceInstance> {
        &self.instance
    }
}

impl Deref for InFlightGuard {
    type Target = ServiceInstance;
    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.instance.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) fn test_instance(service: &str, port: u16) -> Arc<ServiceInstance> {
    Arc::new(ServiceInstance::new(service, Endpoint::new("127.0.0.1", port)).unwrap())
}
