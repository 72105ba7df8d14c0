//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to startup, which builds every subsystem from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new revision sent over a channel
//!     → static discovery endpoints swapped in
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Durations are stored as integer milliseconds and exposed as `Duration`

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, CircuitBreakerConfig, DiscoveryConfig, DiscoveryKind, GatewayConfig,
    HealthCheckConfig, ListenerConfig, LoadBalancerConfig, ObservabilityConfig,
    StaticInstanceConfig, TimeoutConfig, UpstreamsConfig,
};
