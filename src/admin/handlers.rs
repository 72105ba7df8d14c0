use axum::{extract::State, Json};
use serde::Serialize;

use crate::health::HealthState;
use crate::http::server::AppState;
use crate::resilience::BreakerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub services: Vec<ServiceSummary>,
}

#[derive(Serialize)]
pub struct ServiceSummary {
    pub service: String,
    pub instances: usize,
    pub available: usize,
}

#[derive(Serialize)]
pub struct InstanceStatus {
    pub service: String,
    pub address: String,
    pub health: HealthState,
    pub tripped: bool,
    pub consecutive_failures: u32,
    pub active_requests: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let services = state
        .registry
        .services()
        .into_iter()
        .map(|service| {
            let (instances, available) = match state.registry.lookup(&service) {
                Ok(list) => (list.len(), list.iter().filter(|i| i.is_available()).count()),
                Err(_) => (0, 0),
            };
            ServiceSummary { service, instances, available }
        })
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        services,
    })
}

pub async fn get_instances(State(state): State<AppState>) -> Json<Vec<InstanceStatus>> {
    let statuses = state
        .registry
        .all_instances()
        .into_iter()
        .map(|i| InstanceStatus {
            service: i.service.clone(),
            address: i.authority(),
            health: i.health(),
            tripped: i.passive.is_tripped(),
            consecutive_failures: i.passive.consecutive_failures(),
            active_requests: i.active_requests(),
        })
        .collect();

    Json(statuses)
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.aggregator.breakers())
}
