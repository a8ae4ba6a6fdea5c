//! Role-tier rate limiter
//!
//! Resolves a role to its bucket set (config override first, built-in policy
//! table otherwise) and charges the subject through the rate store. Unlimited
//! roles never touch the store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::api_key::{policy, Role};
use crate::domain::rate_limit::{RateDecision, RateStore, RoleLimits, Subject};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<dyn RateStore>,
    overrides: HashMap<Role, RoleLimits>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self {
            store,
            overrides: HashMap::new(),
        }
    }

    /// Replace the built-in limits for specific roles
    pub fn with_overrides(mut self, overrides: HashMap<Role, RoleLimits>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Effective limits for a role
    pub fn limits_for(&self, role: Role) -> RoleLimits {
        self.overrides
            .get(&role)
            .cloned()
            .unwrap_or_else(|| policy::default_limits(role))
    }

    /// Charge `cost` tokens against a subject's buckets
    pub async fn check(
        &self,
        subject: &Subject,
        role: Role,
        cost: u32,
    ) -> Result<RateDecision, DomainError> {
        let limits = self.limits_for(role);
        if limits.is_unlimited() {
            return Ok(RateDecision::Allowed {
                remaining: u32::MAX,
            });
        }

        let decision = self
            .store
            .take(&subject.as_store_id(), &limits.buckets(), cost)
            .await?;

        if let RateDecision::Denied { retry_after } = &decision {
            debug!(
                "Rate limit exceeded: subject={}, role={}, retry_after_ms={}",
                subject,
                role,
                retry_after.as_millis()
            );
        }

        Ok(decision)
    }

    /// Drop all counters for a subject
    pub async fn reset(&self, subject: &Subject) -> Result<(), DomainError> {
        self.store.reset(&subject.as_store_id()).await
    }
}
