//! Discovery backed by the endpoint list in the config file.

use std::collections::HashMap;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::config::StaticInstanceConfig;
use crate::discovery::{Discovery, DiscoveryError, Endpoint};

/// Config-file discovery. The list can be swapped on config reload.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    endpoints: ArcSwap<HashMap<String, Vec<Endpoint>>>,
}

impl StaticDiscovery {
    pub fn new(instances: &[StaticInstanceConfig]) -> Self {
        let discovery = Self::default();
        discovery.replace(instances);
        discovery
    }

    /// Swap in a new endpoint list; picked up on the next refresh.
    pub fn replace(&self, instances: &[StaticInstanceConfig]) {
        let mut grouped: HashMap<String, Vec<Endpoint>> = HashMap::new();
        for instance in instances {
            grouped
                .entry(instance.service.clone())
                .or_default()
                .push(Endpoint::new(instance.host.clone(), instance.port));
        }
        tracing::debug!(services = grouped.len(), "Static discovery list updated");
        self.endpoints.store(grouped.into());
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn list_instances(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        Ok(self.endpoints.load().get(service).cloned().unwrap_or_default())
    }
}
