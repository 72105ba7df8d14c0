//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{instance::ServiceInstance, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through instances in registry order.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        if instances.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % instances.len();
        Some(Arc::clone(&instances[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::instance::test_instance;

    #[test]
    fn test_round_robin_visits_each_once_in_order() {
        let lb = RoundRobin::new();
        let instances: Vec<_> = (0..4)
            .map(|i| test_instance("bookmark-service", 8080 + i))
            .collect();

        for _ in 0..3 {
            let picked: Vec<u16> = (0..instances.len())
                .map(|_| lb.next_server(&instances).unwrap().endpoint.port)
                .collect();
            assert_eq!(picked, vec![8080, 8081, 8082, 8083]);
        }
    }

    #[test]
    fn test_empty() {
        assert!(RoundRobin::new().next_server(&[]).is_none());
    }
}
