//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated configuration
//! - Populate the registry once before traffic is accepted
//! - Start background tasks (refresher, pings, config watcher)
//! - Serve the public and admin listeners
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::admin::setup_admin_router;
use crate::aggregation::PassportAggregator;
use crate::config::{watcher::ConfigWatcher, DiscoveryKind, GatewayConfig};
use crate::discovery::{
    Discovery, DiscoveryError, HttpDiscovery, InstanceRegistry, RefresherHandle, RegistryRefresher,
    StaticDiscovery,
};
use crate::health::HealthMonitor;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::load_balancer::InstanceSelector;
use crate::upstream::UpstreamClient;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("discovery setup failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("config watcher failed: {0}")]
    Watcher(#[from] notify::Error),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fully wired gateway, not yet serving.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    registry: Arc<InstanceRegistry>,
    discovery: Arc<dyn Discovery>,
    static_discovery: Option<Arc<StaticDiscovery>>,
    aggregator: Arc<PassportAggregator>,
}

impl Gateway {
    pub fn build(config: GatewayConfig) -> Result<Self, StartupError> {
        let config = Arc::new(config);
        let registry = Arc::new(InstanceRegistry::new());

        let mut static_discovery = None;
        let discovery: Arc<dyn Discovery> = match config.discovery.kind {
            DiscoveryKind::Static => {
                let list = Arc::new(StaticDiscovery::new(&config.discovery.instances));
                static_discovery = Some(list.clone());
                list
            }
            DiscoveryKind::Http => Arc::new(HttpDiscovery::new(
                &config.discovery.base_url,
                config.discovery.poll_timeout(),
            )?),
        };

        let selector = Arc::new(InstanceSelector::new(
            registry.clone(),
            config.load_balancer.clone(),
        ));
        let client = UpstreamClient::new(config.timeouts.call(), &config.load_balancer);
        let aggregator = Arc::new(PassportAggregator::new(&config, selector, client));

        tracing::info!(
            discovery = ?config.discovery.kind,
            rule = %config.load_balancer.rule,
            call_timeout_ms = config.timeouts.call_ms,
            aggregate_timeout_ms = config.timeouts.aggregate_ms,
            "Gateway components initialized"
        );

        Ok(Self {
            config,
            registry,
            discovery,
            static_discovery,
            aggregator,
        })
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn aggregator(&self) -> &Arc<PassportAggregator> {
        &self.aggregator
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.aggregator.clone(), self.registry.clone(), self.config.clone())
    }

    fn refresher(&self) -> RegistryRefresher {
        RegistryRefresher::new(
            self.registry.clone(),
            self.discovery.clone(),
            vec![
                self.config.upstreams.bookmark_service.clone(),
                self.config.upstreams.contact_service.clone(),
            ],
            self.config.discovery.refresh_interval(),
            self.config.discovery.poll_timeout(),
        )
    }

    /// Start background tasks and serve on the given listeners.
    ///
    /// `config_path` enables hot reload of the static endpoint list.
    pub async fn start(
        self,
        listener: TcpListener,
        admin_listener: Option<TcpListener>,
        config_path: Option<PathBuf>,
    ) -> Result<RunningGateway, StartupError> {
        let shutdown = Shutdown::new();

        // first refresh before any traffic
        let refresher = self.refresher();
        refresher.refresh_once().await;
        let refresher = refresher.start();

        let monitor = HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
        let monitor = tokio::spawn(monitor.run(shutdown.subscribe()));

        let watcher = match (&config_path, &self.static_discovery) {
            (Some(path), Some(list)) => {
                Some(self.spawn_reload(path.clone(), list.clone(), &shutdown)?)
            }
            _ => None,
        };

        let state = self.state();

        let admin = match admin_listener {
            Some(admin_listener) => {
                let admin_addr = admin_listener.local_addr()?;
                let router = setup_admin_router(state.clone());
                let mut stop = shutdown.subscribe();
                tracing::info!(address = %admin_addr, "Admin API listening");
                let task = tokio::spawn(async move {
                    axum::serve(admin_listener, router)
                        .with_graceful_shutdown(async move {
                            let _ = stop.recv().await;
                        })
                        .await
                });
                Some((admin_addr, task))
            }
            None => None,
        };

        let local_addr = listener.local_addr()?;
        let server = HttpServer::new(state);
        let server = tokio::spawn(server.run(listener, shutdown.subscribe()));

        Ok(RunningGateway {
            local_addr,
            admin_addr: admin.as_ref().map(|(addr, _)| *addr),
            shutdown,
            server,
            admin: admin.map(|(_, task)| task),
            monitor,
            refresher,
            _watcher: watcher,
        })
    }

    /// Apply new static endpoint lists as the config file changes.
    fn spawn_reload(
        &self,
        path: PathBuf,
        list: Arc<StaticDiscovery>,
        shutdown: &Shutdown,
    ) -> Result<RecommendedWatcher, StartupError> {
        let (watcher, updates) = ConfigWatcher::new(&path);
        let handle = watcher.run()?;
        tokio::spawn(apply_reloads(updates, list, self.refresher(), shutdown.subscribe()));
        Ok(handle)
    }
}

async fn apply_reloads(
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    list: Arc<StaticDiscovery>,
    refresher: RegistryRefresher,
    mut stop: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                list.replace(&config.discovery.instances);
                refresher.refresh_once().await;
                tracing::info!(
                    instances = config.discovery.instances.len(),
                    "Static discovery list reloaded"
                );
            }
            _ = stop.recv() => break,
        }
    }
}

/// A serving gateway. Dropping it does not stop the tasks; call `shutdown`.
pub struct RunningGateway {
    pub local_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    shutdown: Shutdown,
    server: JoinHandle<Result<(), std::io::Error>>,
    admin: Option<JoinHandle<Result<(), std::io::Error>>>,
    monitor: JoinHandle<()>,
    refresher: RefresherHandle,
    _watcher: Option<RecommendedWatcher>,
}

impl RunningGateway {
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Wait until the shutdown coordinator fires, then drain and stop.
    pub async fn wait(self) -> Result<(), StartupError> {
        // every task subscribed during start, so joining them waits for the signal
        self.stop().await
    }

    /// Trigger shutdown, drain listeners and stop background tasks.
    pub async fn shutdown(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        self.stop().await
    }

    async fn stop(self) -> Result<(), StartupError> {
        let served = join_server(self.server, "HTTP server").await;
        // the server may have exited on its own; release the other tasks too
        self.shutdown.trigger();
        if let Some(admin) = self.admin {
            join_server(admin, "Admin API").await?;
        }
        if let Err(e) = self.monitor.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
        self.refresher.stop().await;
        tracing::info!("Gateway stopped");
        served
    }
}

async fn join_server(
    task: JoinHandle<Result<(), std::io::Error>>,
    name: &'static str,
) -> Result<(), StartupError> {
    match task.await {
        Ok(result) => Ok(result?),
        Err(e) => {
            tracing::error!(error = %e, server = name, "Server task failed");
            Ok(())
        }
    }
}
