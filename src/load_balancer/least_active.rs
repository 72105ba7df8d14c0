//! Least-active load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{instance::ServiceInstance, LoadBalancer};

/// Selects the instance with the fewest in-flight requests.
#[derive(Debug, Default)]
pub struct LeastActive;

impl LeastActive {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastActive {
    fn next_server(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        // min_by_key keeps the first minimum, so ties go to registry order
        instances
            .iter()
            .min_by_key(|i| i.active_requests())
            .cloned()
    }
}
