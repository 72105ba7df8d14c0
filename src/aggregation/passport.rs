//! Passport aggregation.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::aggregation::Dependency;
use crate::config::GatewayConfig;
use crate::load_balancer::InstanceSelector;
use crate::model::{Bookmark, Contact, DegradedBranches, Passport};
use crate::resilience::{BreakerSnapshot, Execution};
use crate::upstream::UpstreamClient;

pub const BOOKMARKS: &str = "bookmarks";
pub const CONTACTS: &str = "contacts";

/// Fans a user key out to both record services and merges the answers.
#[derive(Debug)]
pub struct PassportAggregator {
    bookmarks: Dependency<Bookmark>,
    contacts: Dependency<Contact>,
    deadline: Duration,
}

impl PassportAggregator {
    pub fn new(
        config: &GatewayConfig,
        selector: Arc<InstanceSelector>,
        client: UpstreamClient,
    ) -> Self {
        let rule = config.load_balancer.rule;
        Self {
            bookmarks: Dependency::new(
                BOOKMARKS,
                config.upstreams.bookmark_service.clone(),
                rule,
                &config.circuit_breaker,
                Arc::clone(&selector),
                client.clone(),
            ),
            contacts: Dependency::new(
                CONTACTS,
                config.upstreams.contact_service.clone(),
                rule,
                &config.circuit_breaker,
                selector,
                client,
            ),
            deadline: config.timeouts.aggregate(),
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn bookmark_dependency(&self) -> &Dependency<Bookmark> {
        &self.bookmarks
    }

    pub fn contact_dependency(&self) -> &Dependency<Contact> {
        &self.contacts
    }

    /// Build the passport for `user_key`. Never fails and never outlives the
    /// aggregate deadline; late or failed branches come back empty and marked.
    pub async fn aggregate(&self, user_key: &str) -> Passport {
        let deadline = Instant::now() + self.deadline;

        let (bookmarks, contacts) = tokio::join!(
            self.bookmarks.fetch_until(user_key, deadline),
            self.contacts.fetch_until(user_key, deadline),
        );

        let degraded = DegradedBranches {
            bookmarks: bookmarks.is_degraded(),
            contacts: contacts.is_degraded(),
        };
        if degraded.any() {
            tracing::info!(
                user_key = %user_key,
                bookmarks_degraded = degraded.bookmarks,
                contacts_degraded = degraded.contacts,
                "Passport served degraded"
            );
        }

        Passport {
            user_id: user_key.to_string(),
            bookmarks: bookmarks.value,
            contacts: contacts.value,
            degraded,
        }
    }

    /// Bookmarks alone, bounded by the same deadline.
    pub async fn bookmarks(&self, user_key: &str) -> Execution<Vec<Bookmark>> {
        self.bookmarks.fetch_until(user_key, Instant::now() + self.deadline).await
    }

    /// Contacts alone, bounded by the same deadline.
    pub async fn contacts(&self, user_key: &str) -> Execution<Vec<Contact>> {
        self.contacts.fetch_until(user_key, Instant::now() + self.deadline).await
    }

    pub fn breakers(&self) -> Vec<BreakerSnapshot> {
        vec![self.bookmarks.snapshot(), self.contacts.snapshot()]
    }
}
