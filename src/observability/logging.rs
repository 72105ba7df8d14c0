//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the filter from `RUST_LOG`, else the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Human-readable fmt output; fields carry service, instance, breaker
//! - HTTP spans come from tower-http's TraceLayer

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "passport_gateway=debug,tower_http=debug";

/// Resolve the filter directive: `RUST_LOG` wins, then `configured`, then
/// the crate default.
pub fn filter_directive(env: Option<String>, configured: Option<&str>) -> String {
    env.filter(|s| !s.trim().is_empty())
        .or_else(|| configured.filter(|s| !s.trim().is_empty()).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_tracing(configured: Option<&str>) {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_config() {
        assert_eq!(filter_directive(Some("warn".into()), Some("info")), "warn");
    }

    #[test]
    fn test_config_used_without_env() {
        assert_eq!(filter_directive(None, Some("info")), "info");
        assert_eq!(filter_directive(Some("  ".into()), Some("info")), "info");
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(filter_directive(None, None), DEFAULT_FILTER);
        assert_eq!(filter_directive(None, Some("")), DEFAULT_FILTER);
    }
}
