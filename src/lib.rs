//! Passport gateway library.
//!
//! Resolves bookmark and contact services through discovery, balances calls
//! across their instances, guards each dependency with a circuit breaker and
//! merges both answers into one passport per user key.

pub mod admin;
pub mod aggregation;
pub mod config;
pub mod discovery;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod model;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use aggregation::PassportAggregator;
pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, RunningGateway, Shutdown};
pub use model::{Bookmark, Contact, Passport};
