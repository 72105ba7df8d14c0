//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Pings (active.rs):
//!     Periodic timer
//!     → GET the ping path on every registered instance
//!     → Update state.rs
//!
//! Call outcomes (passive.rs):
//!     Upstream call failure observed
//!     → Increment consecutive failure count
//!     → Trip the instance for a cooldown once the threshold is reached
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Pings and call outcomes are complementary; either can exclude an instance
//! - State transitions require consecutive successes/failures
//! - Health state lives on the instance and survives registry refreshes

pub mod active;
pub mod passive;
pub mod state;

pub use active::HealthMonitor;
pub use passive::PassiveHealth;
pub use state::{HealthState, PingState};
