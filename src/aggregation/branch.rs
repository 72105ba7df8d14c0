//! One dependency branch: breaker, selection and call for a record list.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::load_balancer::{InstanceSelector, RuleKind};
use crate::resilience::{BreakerSnapshot, CircuitBreaker, Execution, FallbackReason, Source};
use crate::upstream::{UpstreamClient, UpstreamError};

/// A logical dependency returning `Vec<T>` for a user key.
///
/// Owns its circuit breaker; the fallback is always the empty list.
pub struct Dependency<T> {
    branch: &'static str,
    service: String,
    rule: RuleKind,
    breaker: CircuitBreaker,
    selector: Arc<InstanceSelector>,
    client: UpstreamClient,
    _records: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Dependency<T> {
    /// `branch` doubles as the breaker name and the resource path segment.
    pub fn new(
        branch: &'static str,
        service: impl Into<String>,
        rule: RuleKind,
        breaker: &CircuitBreakerConfig,
        selector: Arc<InstanceSelector>,
        client: UpstreamClient,
    ) -> Self {
        Self {
            branch,
            service: service.into(),
            rule,
            breaker: CircuitBreaker::new(branch, breaker),
            selector,
            client,
            _records: PhantomData,
        }
    }

    pub fn branch(&self) -> &'static str {
        self.branch
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Fetch the records for `user_key` through the breaker.
    pub async fn fetch(&self, user_key: &str) -> Execution<Vec<T>> {
        self.breaker.execute(|| self.call(user_key), Vec::new).await
    }

    /// Like `fetch`, but falls back once `deadline` passes. A call cut off by
    /// the deadline counts against the breaker; one dropped by the caller
    /// does not.
    pub async fn fetch_until(&self, user_key: &str, deadline: Instant) -> Execution<Vec<T>> {
        let execution = self
            .breaker
            .execute_until(deadline, || self.call(user_key), Vec::new)
            .await;
        if matches!(execution.source, Source::Fallback(FallbackReason::DeadlineExceeded)) {
            tracing::warn!(
                branch = self.branch,
                service = %self.service,
                user_key = %user_key,
                "Branch missed the aggregate deadline"
            );
        }
        execution
    }

    async fn call(&self, user_key: &str) -> Result<Vec<T>, UpstreamError> {
        let guard = self.selector.select(&self.service, self.rule)?;
        self.client
            .get_json::<Vec<T>>(&guard, &[user_key, self.branch])
            .await
    }
}

impl<T> std::fmt::Debug for Dependency<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("branch", &self.branch)
            .field("service", &self.service)
            .field("rule", &self.rule)
            .field("breaker", &self.breaker.state())
            .finish()
    }
}
