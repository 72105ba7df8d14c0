//! HTTP server setup and handlers.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request timeout, request ID)
//! - Serve bookmarks, contacts and the merged passport per user key
//! - Report degraded branches in a response header
//! - Drain gracefully on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::aggregation::{PassportAggregator, BOOKMARKS, CONTACTS};
use crate::config::GatewayConfig;
use crate::discovery::InstanceRegistry;
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};
use crate::observability::metrics;
use crate::resilience::Execution;

/// Comma-separated names of branches served from a fallback.
pub const X_PASSPORT_DEGRADED: &str = "x-passport-degraded";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<PassportAggregator>,
    pub registry: Arc<InstanceRegistry>,
    pub config: Arc<GatewayConfig>,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        aggregator: Arc<PassportAggregator>,
        registry: Arc<InstanceRegistry>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            aggregator,
            registry,
            config,
            started: Instant::now(),
        }
    }
}

/// Public HTTP server of the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);
        let router = Self::build_router(state, request_timeout);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/{user_key}/bookmarks", get(bookmarks_handler))
            .route("/{user_key}/contacts", get(contacts_handler))
            .route("/{user_key}/passport", get(passport_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(set_request_id_layer())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn bookmarks_handler(
    State(state): State<AppState>,
    Path(user_key): Path<String>,
) -> Response {
    let start = Instant::now();
    let execution = state.aggregator.bookmarks(&user_key).await;
    metrics::record_request("bookmarks", StatusCode::OK.as_u16(), start);
    branch_response(BOOKMARKS, execution)
}

async fn contacts_handler(
    State(state): State<AppState>,
    Path(user_key): Path<String>,
) -> Response {
    let start = Instant::now();
    let execution = state.aggregator.contacts(&user_key).await;
    metrics::record_request("contacts", StatusCode::OK.as_u16(), start);
    branch_response(CONTACTS, execution)
}

async fn passport_handler(
    State(state): State<AppState>,
    Path(user_key): Path<String>,
) -> Response {
    let start = Instant::now();
    let passport = state.aggregator.aggregate(&user_key).await;
    metrics::record_request("passport", StatusCode::OK.as_u16(), start);

    let degraded = passport.degraded.header_value();
    let mut response = Json(passport).into_response();
    if let Some(value) = degraded.and_then(|v| HeaderValue::from_str(&v).ok()) {
        response.headers_mut().insert(X_PASSPORT_DEGRADED, value);
    }
    response
}

fn branch_response<T: Serialize>(branch: &'static str, execution: Execution<Vec<T>>) -> Response {
    let degraded = execution.is_degraded();
    let mut response = Json(execution.value).into_response();
    if degraded {
        response
            .headers_mut()
            .insert(X_PASSPORT_DEGRADED, HeaderValue::from_static(branch));
    }
    response
}
