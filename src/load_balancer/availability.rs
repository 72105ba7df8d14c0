//! Availability-filtering load balancing strategy.
//!
//! Health and trip filtering happen before any rule runs; this rule adds a
//! saturation filter and then picks uniformly at random.

use std::sync::Arc;

use crate::load_balancer::{instance::ServiceInstance, LoadBalancer};

/// Skips instances at their in-flight limit, random among the rest.
#[derive(Debug)]
pub struct AvailabilityFiltering {
    max_active_requests: usize,
}

impl AvailabilityFiltering {
    pub fn new(max_active_requests: usize) -> Self {
        Self { max_active_requests }
    }
}

impl LoadBalancer for AvailabilityFiltering {
    fn next_server(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        let open: Vec<&Arc<ServiceInstance>> = instances
            .iter()
            .filter(|i| i.active_requests() < self.max_active_requests)
            .collect();

        if open.is_empty() {
            return None;
        }
        Some(Arc::clone(open[fastrand::usize(..open.len())]))
    }
}
