//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dependency call for logical service S
//!     → selector.rs (registry lookup for S)
//!     → drop instances that failed ping or are tripped
//!     → Apply load balancing rule:
//!         - round_robin.rs (rotate through instances in registry order)
//!         - availability.rs (skip saturated instances, pick at random)
//!         - least_active.rs (pick instance with fewest in-flight requests)
//!     → instance.rs (in-flight guard held for the duration of the call)
//!     → Return guard or NoAvailableInstance
//! ```
//!
//! # Design Decisions
//! - Rules see only pre-filtered candidates; health filtering is shared
//! - Rule state (round-robin position) is kept per service and rule
//! - The registry owns instances; rules never mutate them

pub mod availability;
pub mod instance;
pub mod least_active;
pub mod round_robin;
pub mod selector;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::LoadBalancerConfig;

pub use instance::{InFlightGuard, ServiceInstance};
pub use selector::InstanceSelector;

/// A selection rule over already-filtered candidates.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick one instance, or `None` if the rule rejects every candidate.
    fn next_server(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>>;
}

/// Configurable rule names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    RoundRobin,
    #[default]
    AvailabilityFiltering,
    LeastActive,
}

impl RuleKind {
    /// Build a fresh rule instance.
    pub fn build(self, config: &LoadBalancerConfig) -> Box<dyn LoadBalancer> {
        match self {
            RuleKind::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            RuleKind::AvailabilityFiltering => Box::new(
                availability::AvailabilityFiltering::new(config.max_active_requests),
            ),
            RuleKind::LeastActive => Box::new(least_active::LeastActive::new()),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleKind::RoundRobin => "round_robin",
            RuleKind::AvailabilityFiltering => "availability_filtering",
            RuleKind::LeastActive => "least_active",
        };
        f.write_str(name)
    }
}
