//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls go straight to the fallback
//! - Half-Open: one trial call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold within the window
//! Open → Half-Open: first call after the cooldown (becomes the trial)
//! Half-Open → Closed: trial succeeds (failure count reset)
//! Half-Open → Open: trial fails or misses its deadline (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per logical dependency, never global
//! - Fail fast in Open state (the operation is not invoked at all)
//! - Exactly one trial in Half-Open; concurrent callers get the fallback
//! - A missed deadline counts as a failure; a permit dropped without an
//!   outcome (caller went away) is released without touching the state
//! - The state mutex is never held across an await

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::upstream::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

/// Published on every state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerEvent {
    pub breaker: String,
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub since_transition_ms: u64,
}

/// Why the fallback value was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The breaker was open (or a trial was already running).
    ShortCircuited,
    /// The operation ran and failed.
    Failed(UpstreamError),
    /// The caller's deadline passed before the operation settled.
    DeadlineExceeded,
}

impl FallbackReason {
    pub fn label(&self) -> &'static str {
        match self {
            FallbackReason::ShortCircuited => "short_circuited",
            FallbackReason::Failed(e) => e.kind(),
            FallbackReason::DeadlineExceeded => "deadline",
        }
    }
}

/// Where an `Execution` value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Upstream,
    Fallback(FallbackReason),
}

/// Result of `CircuitBreaker::execute`: always a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Execution<T> {
    pub fn upstream(value: T) -> Self {
        Self {
            value,
            source: Source::Upstream,
        }
    }

    pub fn fallback(value: T, reason: FallbackReason) -> Self {
        Self {
            value,
            source: Source::Fallback(reason),
        }
    }

    /// True when the value came from the fallback.
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, Source::Fallback(_))
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    /// First failure of the current streak.
    streak_started: Option<Instant>,
    opened_at: Option<Instant>,
    last_transition: Instant,
    trial_in_flight: bool,
}

/// Guards one logical dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    window: Duration,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
    events: broadcast::Sender<BreakerEvent>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            window: config.window(),
            cooldown: config.cooldown(),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                streak_started: None,
                opened_at: None,
                last_transition: Instant::now(),
                trial_in_flight: false,
            }),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            since_transition_ms: inner.last_transition.elapsed().as_millis() as u64,
        }
    }

    /// Receive every future state transition.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerEvent> {
        self.events.subscribe()
    }

    /// Run `operation` if the breaker admits it, otherwise (or on failure)
    /// return `fallback()`. Never fails.
    pub async fn execute<T, F, Fut, FB>(&self, operation: F, fallback: FB) -> Execution<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
        FB: FnOnce() -> T,
    {
        self.run(None, operation, fallback).await
    }

    /// Like `execute`, but an operation still running at `deadline` is
    /// dropped and recorded as a failure.
    pub async fn execute_until<T, F, Fut, FB>(
        &self,
        deadline: Instant,
        operation: F,
        fallback: FB,
    ) -> Execution<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
        FB: FnOnce() -> T,
    {
        self.run(Some(deadline), operation, fallback).await
    }

    async fn run<T, F, Fut, FB>(
        &self,
        deadline: Option<Instant>,
        operation: F,
        fallback: FB,
    ) -> Execution<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
        FB: FnOnce() -> T,
    {
        let Some(permit) = self.try_acquire() else {
            tracing::debug!(breaker = %self.name, "Circuit open, short-circuiting to fallback");
            metrics::record_fallback(&self.name, "short_circuited");
            return Execution::fallback(fallback(), FallbackReason::ShortCircuited);
        };

        let outcome = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, operation()).await.ok(),
            None => Some(operation().await),
        };

        match outcome {
            Some(Ok(value)) => {
                permit.success();
                Execution::upstream(value)
            }
            Some(Err(e)) => {
                permit.failure();
                tracing::warn!(
                    breaker = %self.name,
                    error = %e,
                    "Dependency call failed, using fallback"
                );
                metrics::record_fallback(&self.name, e.kind());
                Execution::fallback(fallback(), FallbackReason::Failed(e))
            }
            None => {
                permit.failure();
                tracing::debug!(breaker = %self.name, "Dependency call missed its deadline");
                metrics::record_fallback(&self.name, FallbackReason::DeadlineExceeded.label());
                Execution::fallback(fallback(), FallbackReason::DeadlineExceeded)
            }
        }
    }

    /// Ask to make one call. `None` means short-circuit.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut inner = self.lock();
        let now = Instant::now();

        let (trial, event) = match inner.state {
            CircuitState::Closed => (false, None),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(inner.last_transition);
                if now.duration_since(opened_at) < self.cooldown {
                    return None;
                }
                inner.trial_in_flight = true;
                (true, self.transition(&mut inner, CircuitState::HalfOpen, now))
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                inner.trial_in_flight = true;
                (true, None)
            }
        };
        drop(inner);
        self.publish(event);

        Some(CallPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        let event = match inner.state {
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                inner.consecutive_failures = 0;
                inner.streak_started = None;
                inner.opened_at = None;
                self.transition(&mut inner, CircuitState::Closed, now)
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                inner.streak_started = None;
                None
            }
            // late result of a call admitted before the circuit opened
            _ => None,
        };
        drop(inner);
        self.publish(event);
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        let event = match inner.state {
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                inner.opened_at = Some(now);
                self.transition(&mut inner, CircuitState::Open, now)
            }
            CircuitState::Closed => {
                let streak_expired = inner
                    .streak_started
                    .is_some_and(|started| now.duration_since(started) > self.window);
                if inner.streak_started.is_none() || streak_expired {
                    inner.streak_started = Some(now);
                    inner.consecutive_failures = 0;
                }
                inner.consecutive_failures += 1;

                if inner.consecutive_failures >= self.failure_threshold {
                    inner.opened_at = Some(now);
                    self.transition(&mut inner, CircuitState::Open, now)
                } else {
                    None
                }
            }
            _ => None,
        };
        drop(inner);
        self.publish(event);
    }

    /// The caller went away before the call settled: free the trial slot
    /// and leave the state and failure streak alone.
    fn on_abandon(&self, trial: bool) {
        if trial {
            self.lock().trial_in_flight = false;
        }
    }

    fn transition(
        &self,
        inner: &mut BreakerInner,
        to: CircuitState,
        now: Instant,
    ) -> Option<BreakerEvent> {
        let from = inner.state;
        if from == to {
            return None;
        }
        inner.state = to;
        inner.last_transition = now;

        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.name,
                from = %from,
                failures = inner.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Circuit opened"
            ),
            _ => tracing::info!(
                breaker = %self.name,
                from = %from,
                to = %to,
                "Circuit state changed"
            ),
        }

        Some(BreakerEvent {
            breaker: self.name.clone(),
            from,
            to,
        })
    }

    fn publish(&self, event: Option<BreakerEvent>) {
        if let Some(event) = event {
            metrics::record_breaker_transition(&event.breaker, event.from, event.to);
            // no subscribers is fine
            let _ = self.events.send(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Admission for one call. Settle it with `success` or `failure`;
/// dropping it unsettled releases it without recording an outcome.
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// True if this call is the Half-Open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(
                breaker = %self.breaker.name,
                trial = self.trial,
                "Call abandoned, outcome discarded"
            );
            self.breaker.on_abandon(self.trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(threshold: u32, window_ms: u64, cooldown_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            window_ms,
            cooldown_ms,
        }
    }

    fn hang() -> std::future::Pending<Result<Vec<u32>, UpstreamError>> {
        std::future::pending()
    }

    fn timeout_error() -> UpstreamError {
        UpstreamError::Timeout {
            target: "contact-service@127.0.0.1:1".into(),
            after: Duration::from_millis(100),
        }
    }

    async fn fail(breaker: &CircuitBreaker, invoked: &AtomicUsize) -> Execution<Vec<u32>> {
        breaker
            .execute(
                || async {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Err(timeout_error())
                },
                Vec::new,
            )
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, invoked: &AtomicUsize) -> Execution<Vec<u32>> {
        breaker
            .execute(
                || async {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2])
                },
                Vec::new,
            )
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_short_circuits() {
        let breaker = CircuitBreaker::new("contacts", &config(3, 10_000, 5_000));
        let invoked = AtomicUsize::new(0);

        for _ in 0..3 {
            let exec = fail(&breaker, &invoked).await;
            assert_eq!(exec.source, Source::Fallback(FallbackReason::Failed(timeout_error())));
            assert!(exec.value.is_empty());
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(invoked.load(Ordering::SeqCst), 3);

        let exec = succeed(&breaker, &invoked).await;
        assert_eq!(exec.source, Source::Fallback(FallbackReason::ShortCircuited));
        assert_eq!(invoked.load(Ordering::SeqCst), 3, "operation must not run while open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_success_closes_and_resets() {
        let breaker = CircuitBreaker::new("contacts", &config(2, 10_000, 5_000));
        let invoked = AtomicUsize::new(0);
        fail(&breaker, &invoked).await;
        fail(&breaker, &invoked).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(breaker.try_acquire().is_none());

        tokio::time::advance(Duration::from_millis(1)).await;
        let trial = breaker.try_acquire().expect("trial after cooldown");
        assert!(trial.is_trial());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // only one trial at a time
        assert!(breaker.try_acquire().is_none());

        trial.success();
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);

        let exec = succeed(&breaker, &invoked).await;
        assert_eq!(exec.source, Source::Upstream);
        assert_eq!(exec.value, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_failure_reopens_and_restarts_cooldown() {
        let breaker = CircuitBreaker::new("bookmarks", &config(1, 10_000, 1_000));
        let invoked = AtomicUsize::new(0);
        fail(&breaker, &invoked).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        fail(&breaker, &invoked).await;
        assert_eq!(invoked.load(Ordering::SeqCst), 2, "trial must reach the operation");
        assert_eq!(breaker.state(), CircuitState::Open);

        // cooldown counts from the trial failure, not the first opening
        tokio::time::advance(Duration::from_millis(900)).await;
        let exec = succeed(&breaker, &invoked).await;
        assert_eq!(exec.source, Source::Fallback(FallbackReason::ShortCircuited));

        tokio::time::advance(Duration::from_millis(100)).await;
        let exec = succeed(&breaker, &invoked).await;
        assert_eq!(exec.source, Source::Upstream);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_streak() {
        let breaker = CircuitBreaker::new("contacts", &config(3, 10_000, 5_000));
        let invoked = AtomicUsize::new(0);
        fail(&breaker, &invoked).await;
        fail(&breaker, &invoked).await;
        succeed(&breaker, &invoked).await;
        fail(&breaker, &invoked).await;
        fail(&breaker, &invoked).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_do_not_open() {
        let breaker = CircuitBreaker::new("contacts", &config(3, 1_000, 5_000));
        let invoked = AtomicUsize::new(0);
        fail(&breaker, &invoked).await;
        fail(&breaker, &invoked).await;
        tokio::time::advance(Duration::from_millis(1_001)).await;
        fail(&breaker, &invoked).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_frees_slot_without_reopening() {
        let breaker = CircuitBreaker::new("contacts", &config(1, 10_000, 1_000));
        let invoked = AtomicUsize::new(0);
        fail(&breaker, &invoked).await;
        tokio::time::advance(Duration::from_millis(1_000)).await;

        let trial = breaker.try_acquire().unwrap();
        drop(trial);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // the next caller becomes the trial
        let exec = succeed(&breaker, &invoked).await;
        assert_eq!(exec.source, Source::Upstream);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_calls_do_not_count_as_failures() {
        let breaker = CircuitBreaker::new("contacts", &config(2, 10_000, 5_000));
        let invoked = AtomicUsize::new(0);
        fail(&breaker, &invoked).await;

        for _ in 0..3 {
            let call = breaker.execute(hang, Vec::new);
            assert!(tokio::time::timeout(Duration::from_millis(50), call).await.is_err());
        }
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_deadline_counts_as_failure() {
        let breaker = CircuitBreaker::new("contacts", &config(2, 10_000, 5_000));

        for _ in 0..2 {
            let deadline = Instant::now() + Duration::from_millis(100);
            let exec = breaker.execute_until(deadline, hang, Vec::new).await;
            assert_eq!(exec.source, Source::Fallback(FallbackReason::DeadlineExceeded));
            assert!(exec.value.is_empty());
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_missing_deadline_reopens() {
        let breaker = CircuitBreaker::new("contacts", &config(1, 10_000, 1_000));
        let invoked = AtomicUsize::new(0);
        fail(&breaker, &invoked).await;
        tokio::time::advance(Duration::from_millis(1_000)).await;

        let deadline = Instant::now() + Duration::from_millis(100);
        breaker.execute_until(deadline, hang, Vec::new).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_events() {
        let breaker = CircuitBreaker::new("contacts", &config(1, 10_000, 1_000));
        let mut events = breaker.subscribe();
        let invoked = AtomicUsize::new(0);

        fail(&breaker, &invoked).await;
        tokio::time::advance(Duration::from_millis(1_000)).await;
        succeed(&breaker, &invoked).await;

        let seen: Vec<(CircuitState, CircuitState)> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| (e.from, e.to))
            .collect();
        assert_eq!(
            seen,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }
}
