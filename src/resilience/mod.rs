//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dependency call:
//!     → circuit_breaker.rs (admit, short-circuit, or admit the single trial)
//!     → operation (select instance, call with per-call timeout)
//!     → outcome settles the permit; failures and short-circuits yield the fallback
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed call goes straight to the fallback
//! - Circuit breaker prevents cascading failures
//! - Breakers are built explicitly and owned by the dependency they guard

pub mod circuit_breaker;

pub use circuit_breaker::{
    BreakerEvent, BreakerSnapshot, CallPermit, CircuitBreaker, CircuitState, Execution,
    FallbackReason, Source,
};
