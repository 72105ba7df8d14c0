//! Passive health checking (instance trip).
//!
//! # Responsibilities
//! - Observe outcomes of real calls made through an instance
//! - Track consecutive failures
//! - Trip the instance for a cooldown once the threshold is reached
//!
//! # Design Decisions
//! - Timeouts, connection errors and non-2xx responses are failures
//! - A tripped instance is skipped by selection until the cooldown ends,
//!   then needs a fresh streak to trip again
//! - Any success clears the streak

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Call-outcome tracking for one instance.
#[derive(Debug, Default)]
pub struct PassiveHealth {
    consecutive_failures: AtomicU32,
    tripped_until: Mutex<Option<Instant>>,
}

impl PassiveHealth {
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// True while the trip cooldown is running.
    pub fn is_tripped(&self) -> bool {
        match *lock(&self.tripped_until) {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *lock(&self.tripped_until) = None;
    }

    /// Record a failed call. Returns true if this failure tripped the instance.
    pub fn record_failure(&self, threshold: u32, cooldown: Duration) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures < threshold {
            return false;
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *lock(&self.tripped_until) = Some(Instant::now() + cooldown);
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_trip_and_cooldown() {
        let health = PassiveHealth::default();
        let cooldown = Duration::from_secs(10);

        assert!(!health.record_failure(3, cooldown));
        assert!(!health.record_failure(3, cooldown));
        assert!(health.record_failure(3, cooldown));
        assert!(health.is_tripped());

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(health.is_tripped());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!health.is_tripped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_streak_and_trip() {
        let health = PassiveHealth::default();
        health.record_failure(2, Duration::from_secs(5));
        health.record_success();
        assert_eq!(health.consecutive_failures(), 0);
        assert!(!health.record_failure(2, Duration::from_secs(5)));

        health.record_failure(2, Duration::from_secs(5));
        assert!(health.is_tripped());
        health.record_success();
        assert!(!health.is_tripped());
    }
}
