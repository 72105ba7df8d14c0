//! Instance registry.
//!
//! # Responsibilities
//! - Hold, per logical service, the ordered set of known instances
//! - Publish whole snapshots atomically so readers never see a partial list
//! - Keep existing instances (and their health) across refreshes

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::discovery::Endpoint;
use crate::load_balancer::ServiceInstance;
use crate::observability::metrics;
use crate::upstream::UpstreamError;

/// Immutable instance list for one service.
pub type InstanceList = Arc<Vec<Arc<ServiceInstance>>>;

type Snapshot = HashMap<String, InstanceList>;

/// Registry of service instances, shared by the load balancer, the
/// refresher and the ping monitor.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    snapshot: ArcSwap<Snapshot>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered instances for `service`.
    pub fn lookup(&self, service: &str) -> Result<InstanceList, UpstreamError> {
        match self.snapshot.load().get(service) {
            Some(list) if !list.is_empty() => Ok(Arc::clone(list)),
            _ => Err(UpstreamError::Resolution {
                service: service.to_string(),
            }),
        }
    }

    /// Install a new endpoint set for one service.
    pub fn replace(&self, service: &str, endpoints: Vec<Endpoint>) {
        self.replace_many(vec![(service.to_string(), endpoints)]);
    }

    /// Install new endpoint sets for several services in one swap.
    pub fn replace_many(&self, updates: Vec<(String, Vec<Endpoint>)>) {
        if updates.is_empty() {
            return;
        }

        // single writer in practice (the refresher), rcu keeps tests honest
        self.snapshot.rcu(|current| {
            let mut next: Snapshot = (**current).clone();
            for (service, endpoints) in &updates {
                let previous = current.get(service);
                next.insert(service.clone(), Arc::new(build_list(service, endpoints, previous)));
            }
            next
        });

        for (service, _) in &updates {
            let count = self.snapshot.load().get(service).map_or(0, |l| l.len());
            metrics::record_registry_size(service, count);
        }
    }

    /// Names of all services the registry has ever seen.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Every instance of every service (for pinging and admin listing).
    pub fn all_instances(&self) -> Vec<Arc<ServiceInstance>> {
        let snapshot = self.snapshot.load();
        let mut entries: Vec<(&String, &InstanceList)> = snapshot.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }
}

fn build_list(
    service: &str,
    endpoints: &[Endpoint],
    previous: Option<&InstanceList>,
) -> Vec<Arc<ServiceInstance>> {
    let mut seen = HashSet::new();
    let mut list = Vec::with_capacity(endpoints.len());

    for endpoint in endpoints {
        if !seen.insert(endpoint.clone()) {
            continue;
        }
        let existing = previous.and_then(|p| p.iter().find(|i| &i.endpoint == endpoint));
        match existing {
            Some(instance) => list.push(Arc::clone(instance)),
            None => match ServiceInstance::new(service, endpoint.clone()) {
                Ok(instance) => list.push(Arc::new(instance)),
                Err(e) => {
                    tracing::warn!(
                        service = %service,
                        endpoint = %endpoint,
                        error = %e,
                        "Ignoring unusable endpoint"
                    );
                }
            },
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    #[test]
    fn test_unknown_service() {
        let registry = InstanceRegistry::new();
        assert_eq!(
            registry.lookup("bookmark-service").unwrap_err(),
            UpstreamError::Resolution { service: "bookmark-service".into() }
        );
    }

    #[test]
    fn test_empty_service_is_resolution_error() {
        let registry = InstanceRegistry::new();
        registry.replace("bookmark-service", vec![]);
        assert!(matches!(
            registry.lookup("bookmark-service"),
            Err(UpstreamError::Resolution { .. })
        ));
        assert_eq!(registry.services(), vec!["bookmark-service".to_string()]);
    }

    #[test]
    fn test_dedup_keeps_order() {
        let registry = InstanceRegistry::new();
        registry.replace("bookmark-service", vec![ep(3), ep(1), ep(3), ep(2), ep(1)]);

        let ports: Vec<u16> = registry
            .lookup("bookmark-service")
            .unwrap()
            .iter()
            .map(|i| i.endpoint.port)
            .collect();
        assert_eq!(ports, vec![3, 1, 2]);
    }

    #[test]
    fn test_refresh_keeps_instance_state() {
        let registry = InstanceRegistry::new();
        registry.replace("contact-service", vec![ep(1), ep(2)]);

        let before = registry.lookup("contact-service").unwrap();
        before[1].ping.mark_failure(1);

        registry.replace("contact-service", vec![ep(2), ep(4)]);
        let after = registry.lookup("contact-service").unwrap();

        assert!(Arc::ptr_eq(&before[1], &after[0]));
        assert!(!after[0].is_available());
        assert!(after[1].is_available());
        // readers holding the old snapshot still see it whole
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].endpoint.port, 1);
    }

    #[test]
    fn test_services_are_independent() {
        let registry = InstanceRegistry::new();
        registry.replace_many(vec![
            ("bookmark-service".into(), vec![ep(1)]),
            ("contact-service".into(), vec![ep(2), ep(3)]),
        ]);
        registry.replace("bookmark-service", vec![ep(5)]);

        assert_eq!(registry.lookup("contact-service").unwrap().len(), 2);
        assert_eq!(registry.lookup("bookmark-service").unwrap()[0].endpoint.port, 5);
        assert_eq!(registry.all_instances().len(), 3);
    }
}
