//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (assign/propagate x-request-id, open span)
//!     → server.rs (route to the bookmark, contact or passport handler)
//!     → aggregation (breakers, selection, upstream calls)
//!     → JSON body, degraded branches in x-passport-degraded
//! ```

pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer, X_PASSPORT_DEGRADED};
