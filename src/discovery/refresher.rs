//! Periodic registry refresh.
//!
//! # Responsibilities
//! - Poll discovery for every configured service on a fixed interval
//! - Bound each poll with a timeout
//! - Publish successful results to the registry in one swap
//! - Leave a service's previous instances in place when its poll fails

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::discovery::{Discovery, Endpoint, InstanceRegistry};
use crate::lifecycle::Shutdown;

/// Background task that keeps the registry in sync with discovery.
pub struct RegistryRefresher {
    registry: Arc<InstanceRegistry>,
    discovery: Arc<dyn Discovery>,
    services: Vec<String>,
    interval: Duration,
    poll_timeout: Duration,
}

impl RegistryRefresher {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        discovery: Arc<dyn Discovery>,
        services: Vec<String>,
        interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            discovery,
            services,
            interval,
            poll_timeout,
        }
    }

    /// Spawn the refresh loop. The first refresh happens immediately.
    pub fn start(self) -> RefresherHandle {
        let shutdown = Shutdown::new();
        let stop = shutdown.subscribe();
        let task = tokio::spawn(self.run(stop));
        RefresherHandle { shutdown, task }
    }

    async fn run(self, mut stop: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            services = ?self.services,
            "Registry refresher starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_once().await;
                }
                _ = stop.recv() => {
                    tracing::info!("Registry refresher stopping");
                    break;
                }
            }
        }
    }

    /// Poll every service once and publish the results.
    pub async fn refresh_once(&self) {
        let mut updates: Vec<(String, Vec<Endpoint>)> = Vec::with_capacity(self.services.len());

        for service in &self.services {
            match time::timeout(self.poll_timeout, self.discovery.list_instances(service)).await {
                Ok(Ok(endpoints)) => {
                    tracing::debug!(
                        service = %service,
                        count = endpoints.len(),
                        "Discovery poll succeeded"
                    );
                    updates.push((service.clone(), endpoints));
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        service = %service,
                        error = %e,
                        "Discovery poll failed, keeping previous instances"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        service = %service,
                        timeout_ms = self.poll_timeout.as_millis() as u64,
                        "Discovery poll timed out, keeping previous instances"
                    );
                }
            }
        }

        self.registry.replace_many(updates);
    }
}

/// Handle to a running refresher.
pub struct RefresherHandle {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Registry refresher task failed");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
