//! Admin API.
//!
//! Served on its own listener and guarded by a Bearer API key:
//! - `GET /admin/status`: version, uptime, instance counts per service
//! - `GET /admin/instances`: every instance with health, trip and load
//! - `GET /admin/breakers`: one snapshot per dependency breaker

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/instances", get(get_instances))
        .route("/admin/breakers", get(get_breakers))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
