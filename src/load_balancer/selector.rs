//! Instance selection.
//!
//! # Responsibilities
//! - Resolve a logical service through the registry
//! - Filter out instances failing pings or tripped by call failures
//! - Apply the requested rule, keeping rule state per service
//! - Hand out an in-flight guard for the chosen instance

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::LoadBalancerConfig;
use crate::discovery::InstanceRegistry;
use crate::load_balancer::{InFlightGuard, LoadBalancer, RuleKind, ServiceInstance};
use crate::upstream::UpstreamError;

/// Picks instances for dependency calls.
#[derive(Debug)]
pub struct InstanceSelector {
    registry: Arc<InstanceRegistry>,
    config: LoadBalancerConfig,
    /// (service, rule) -> rule state.
    rules: DashMap<(String, RuleKind), Arc<dyn LoadBalancer>>,
}

impl InstanceSelector {
    pub fn new(registry: Arc<InstanceRegistry>, config: LoadBalancerConfig) -> Self {
        Self {
            registry,
            config,
            rules: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Select an instance of `service` under `rule`.
    pub fn select(&self, service: &str, rule: RuleKind) -> Result<InFlightGuard, UpstreamError> {
        let instances = self.registry.lookup(service)?;

        let candidates: Vec<Arc<ServiceInstance>> = instances
            .iter()
            .filter(|i| i.is_available())
            .cloned()
            .collect();

        let chosen = if candidates.is_empty() {
            None
        } else {
            self.rule_for(service, rule).next_server(&candidates)
        };

        match chosen {
            Some(instance) => {
                tracing::trace!(
                    service = %service,
                    instance = %instance.authority(),
                    rule = %rule,
                    "Instance selected"
                );
                Ok(instance.begin_request())
            }
            None => {
                tracing::debug!(
                    service = %service,
                    known = instances.len(),
                    rule = %rule,
                    "No available instance"
                );
                for i in instances.iter() {
                    tracing::debug!(
                        instance = %i.authority(),
                        health = ?i.health(),
                        tripped = i.passive.is_tripped(),
                        active = i.active_requests(),
                        "Instance status"
                    );
                }
                Err(UpstreamError::NoAvailableInstance {
                    service: service.to_string(),
                    known: instances.len(),
                })
            }
        }
    }

    fn rule_for(&self, service: &str, rule: RuleKind) -> Arc<dyn LoadBalancer> {
        let key = (service.to_string(), rule);
        if let Some(existing) = self.rules.get(&key) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .rules
            .entry(key)
            .or_insert_with(|| Arc::from(rule.build(&self.config)));
        Arc::clone(entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Endpoint;
    use std::time::Duration;

    fn selector_with(ports: &[u16]) -> InstanceSelector {
        let registry = Arc::new(InstanceRegistry::new());
        registry.replace(
            "bookmark-service",
            ports.iter().map(|p| Endpoint::new("127.0.0.1", *p)).collect(),
        );
        InstanceSelector::new(registry, LoadBalancerConfig::default())
    }

    fn port(guard: Result<InFlightGuard, UpstreamError>) -> u16 {
        guard.unwrap().endpoint.port
    }

    #[test]
    fn test_round_robin_in_registry_order() {
        let selector = selector_with(&[1, 2, 3]);
        let picks: Vec<u16> = (0..6)
            .map(|_| port(selector.select("bookmark-service", RuleKind::RoundRobin)))
            .collect();
        assert_eq!(picks, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_unhealthy_never_selected() {
        let selector = selector_with(&[1, 2, 3]);
        let instances = selector.registry().lookup("bookmark-service").unwrap();
        instances[0].ping.mark_failure(1);
        instances[2].ping.mark_failure(1);

        for rule in [RuleKind::RoundRobin, RuleKind::AvailabilityFiltering, RuleKind::LeastActive] {
            for _ in 0..10 {
                assert_eq!(port(selector.select("bookmark-service", rule)), 2);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tripped_instance_skipped_until_cooldown() {
        let selector = selector_with(&[1, 2]);
        let instances = selector.registry().lookup("bookmark-service").unwrap();
        instances[0].passive.record_failure(1, Duration::from_secs(10));

        for _ in 0..4 {
            assert_eq!(port(selector.select("bookmark-service", RuleKind::RoundRobin)), 2);
        }

        tokio::time::advance(Duration::from_secs(10)).await;
        let picks: Vec<u16> = (0..2)
            .map(|_| port(selector.select("bookmark-service", RuleKind::RoundRobin)))
            .collect();
        assert!(picks.contains(&1));
    }

    #[test]
    fn test_none_available() {
        let selector = selector_with(&[1, 2]);
        for instance in selector.registry().lookup("bookmark-service").unwrap().iter() {
            instance.ping.mark_failure(1);
        }
        assert_eq!(
            selector.select("bookmark-service", RuleKind::RoundRobin).unwrap_err(),
            UpstreamError::NoAvailableInstance { service: "bookmark-service".into(), known: 2 }
        );
    }

    #[test]
    fn test_unknown_service() {
        let selector = selector_with(&[1]);
        assert!(matches!(
            selector.select("contact-service", RuleKind::RoundRobin),
            Err(UpstreamError::Resolution { .. })
        ));
    }

    #[test]
    fn test_guard_counts_active() {
        let selector = selector_with(&[1]);
        let guard = selector.select("bookmark-service", RuleKind::LeastActive).unwrap();
        assert_eq!(guard.active_requests(), 1);
        let instance = Arc::clone(guard.instance());
        drop(guard);
        assert_eq!(instance.active_requests(), 0);
    }
}
