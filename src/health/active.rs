//! Active health checking.
//!
//! # Responsibilities
//! - Periodically ping every registered instance
//! - Update instance ping state with hysteresis thresholds

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::discovery::InstanceRegistry;
use crate::load_balancer::ServiceInstance;
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<InstanceRegistry>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<InstanceRegistry>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            registry,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Instance pings disabled");
            return;
        }

        tracing::info!(
            interval_ms = self.config.interval_ms,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Ping every instance currently in the registry once.
    pub async fn check_all(&self) {
        for instance in self.registry.all_instances() {
            let healthy = self.ping(&instance).await;

            let transition = if healthy {
                instance.ping.mark_success(self.config.healthy_threshold as usize)
            } else {
                instance.ping.mark_failure(self.config.unhealthy_threshold as usize)
            };

            if let Some(state) = transition {
                tracing::info!(instance = %instance, state = ?state, "Instance health changed");
            }

            metrics::record_instance_health(&instance.to_string(), instance.ping.is_healthy());
        }
    }

    async fn ping(&self, instance: &ServiceInstance) -> bool {
        let uri = format!("http://{}{}", instance.authority(), self.config.path);

        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "passport-gateway-ping")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(instance = %instance, error = %e, "Failed to build ping request");
                return false;
            }
        };

        match time::timeout(self.config.timeout(), self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(
                        instance = %instance,
                        status = %response.status(),
                        "Ping failed: non-success status"
                    );
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(instance = %instance, error = %e, "Ping failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(instance = %instance, "Ping failed: timeout");
                false
            }
        }
    }
}
