//! Rate counter store trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::types::{BucketSpec, RateDecision};
use crate::domain::DomainError;

/// Storage backend for token buckets.
///
/// Implementations must make `take` atomic: when two concurrent requests race
/// for the last token, exactly one may win. Tokens are consumed together with
/// the allow decision - a denial consumes nothing, and nothing is ever
/// reserved speculatively.
#[async_trait]
pub trait RateStore: Send + Sync + Debug {
    /// Try to consume `cost` tokens from every bucket of `subject` at once.
    ///
    /// Allowed only when all buckets hold at least `cost` tokens; on denial
    /// the reported retry-after is the minimum wait across the failing
    /// buckets. An empty bucket list always allows.
    async fn take(
        &self,
        subject: &str,
        buckets: &[BucketSpec],
        cost: u32,
    ) -> Result<RateDecision, DomainError>;

    /// Drop all counters for a subject (used when its limits change)
    async fn reset(&self, subject: &str) -> Result<(), DomainError>;
}
