//! Instance health state machine driven by pings.
//!
//! # States
//! - Unknown: never probed; receives traffic
//! - Healthy: receives traffic
//! - Unhealthy: excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Healthy/Unknown → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy/Unknown → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! Hysteresis prevents flapping. Counters are plain atomics; a racing
//! probe can at worst delay a transition by one round.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// Ping-driven health of one instance.
#[derive(Debug)]
pub struct PingState {
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
}

impl Default for PingState {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }
}

impl PingState {
    pub fn current(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Healthy or Unknown.
    pub fn is_healthy(&self) -> bool {
        self.current() != HealthState::Unhealthy
    }

    /// Record a successful ping. Returns the new state if it changed.
    pub fn mark_success(&self, healthy_threshold: usize) -> Option<HealthState> {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.current() == HealthState::Healthy {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            return Some(HealthState::Healthy);
        }
        None
    }

    /// Record a failed ping. Returns the new state if it changed.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> Option<HealthState> {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.current() == HealthState::Unhealthy {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            return Some(HealthState::Unhealthy);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_counts_as_healthy() {
        let state = PingState::default();
        assert_eq!(state.current(), HealthState::Unknown);
        assert!(state.is_healthy());
    }

    #[test]
    fn test_hysteresis() {
        let state = PingState::default();

        assert_eq!(state.mark_failure(2), None);
        assert!(state.is_healthy());
        assert_eq!(state.mark_failure(2), Some(HealthState::Unhealthy));
        assert!(!state.is_healthy());

        // one success is not enough to recover with threshold 2
        assert_eq!(state.mark_success(2), None);
        assert!(!state.is_healthy());
        assert_eq!(state.mark_success(2), Some(HealthState::Healthy));
        assert!(state.is_healthy());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let state = PingState::default();
        state.mark_failure(2);
        state.mark_success(1);
        assert_eq!(state.mark_failure(2), None);
        assert!(state.is_healthy());
    }
}
