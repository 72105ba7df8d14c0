//! Aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! aggregate(user_key):
//!     deadline = now + aggregate timeout
//!     join!(
//!         bookmarks: breaker → timeout_at(deadline, select → call),
//!         contacts:  breaker → timeout_at(deadline, select → call),
//!     )
//!     → merge, marking every branch that used its fallback
//! ```
//!
//! # Design Decisions
//! - Branches are plain futures joined in place, not spawned tasks
//! - Dropping the aggregate future cancels both branches; their breaker
//!   permits are released without an outcome
//! - A branch cut off by the deadline counts as a breaker failure
//! - Fallback for every branch is the empty list

pub mod branch;
pub mod passport;

pub use branch::Dependency;
pub use passport::{PassportAggregator, BOOKMARKS, CONTACTS};
