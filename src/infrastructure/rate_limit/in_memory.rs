//! In-memory rate store
//!
//! Same continuous-refill math as the Redis store, behind a single mutex.
//! Counters are process-local, so this backend is only suitable for tests
//! and single-instance development runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::rate_limit::{BucketSpec, RateDecision, RateStore};
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

#[derive(Debug, Default)]
pub struct InMemoryRateStore {
    buckets: Mutex<HashMap<String, BucketState>>,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_key(subject: &str, spec: &BucketSpec) -> String {
        format!("{}:{}", subject, spec.granularity.as_str())
    }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    async fn take(
        &self,
        subject: &str,
        buckets: &[BucketSpec],
        cost: u32,
    ) -> Result<RateDecision, DomainError> {
        if buckets.is_empty() {
            return Ok(RateDecision::Allowed {
                remaining: u32::MAX,
            });
        }

        let now = Instant::now();
        let cost = f64::from(cost);

        let mut map = self
            .buckets
            .lock()
            .map_err(|_| DomainError::internal("Rate store mutex poisoned"))?;

        // First pass: refill and check every bucket without consuming
        let mut balances = Vec::with_capacity(buckets.len());
        let mut min_wait: Option<Duration> = None;

        for spec in buckets {
            let cap = f64::from(spec.capacity);
            let state = map
                .get(&Self::bucket_key(subject, spec))
                .copied()
                .unwrap_or(BucketState {
                    tokens: cap,
                    refilled_at: now,
                });

            let elapsed = now.saturating_duration_since(state.refilled_at);
            let tokens = (state.tokens + elapsed.as_secs_f64() * spec.refill_per_second()).min(cap);
            balances.push(tokens);

            if tokens < cost {
                let wait = Duration::from_secs_f64((cost - tokens) / spec.refill_per_second());
                min_wait = Some(match min_wait {
                    Some(current) if current < wait => current,
                    _ => wait,
                });
            }
        }

        if let Some(retry_after) = min_wait {
            return Ok(RateDecision::Denied {
                retry_after: retry_after.max(Duration::from_millis(1)),
            });
        }

        // Second pass: consume
        let mut min_remaining = u32::MAX;
        for (spec, tokens) in buckets.iter().zip(balances) {
            let remaining = tokens - cost;
            map.insert(
                Self::bucket_key(subject, spec),
                BucketState {
                    tokens: remaining,
                    refilled_at: now,
                },
            );
            min_remaining = min_remaining.min(remaining.floor() as u32);
        }

        Ok(RateDecision::Allowed {
            remaining: min_remaining,
        })
    }

    async fn reset(&self, subject: &str) -> Result<(), DomainError> {
        let prefix = format!("{}:", subject);
        let mut map = self
            .buckets
            .lock()
            .map_err(|_| DomainError::internal("Rate store mutex poisoned"))?;
        map.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rate_limit::Granularity;

    #[tokio::test]
    async fn test_take_until_exhausted() {
        let store = InMemoryRateStore::new();
        let buckets = vec![BucketSpec::new(Granularity::Hour, 3)];

        for expected_remaining in [2, 1, 0] {
            let decision = store.take("key:t1", &buckets, 1).await.unwrap();
            assert_eq!(
                decision,
                RateDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }

        let denied = store.take("key:t1", &buckets, 1).await.unwrap();
        assert!(!denied.is_allowed());
    }

    #[tokio::test]
    async fn test_denial_consumes_nothing() {
        let store = InMemoryRateStore::new();
        let buckets = vec![
            BucketSpec::new(Granularity::Hour, 100),
            BucketSpec::new(Granularity::Second, 1),
        ];

        let denied = store.take("key:t2", &buckets, 2).await.unwrap();
        assert!(!denied.is_allowed());

        // The hour bucket was not touched by the denied request
        let hour_only = vec![BucketSpec::new(Granularity::Hour, 100)];
        let decision = store.take("key:t2", &hour_only, 1).await.unwrap();
        assert_eq!(decision, RateDecision::Allowed { remaining: 99 });
    }

    #[tokio::test]
    async fn test_refill_over_time() {
        let store = InMemoryRateStore::new();
        // 20 tokens per second refill
        let buckets = vec![BucketSpec::new(Granularity::Second, 20)];

        let decision = store.take("key:t3", &buckets, 20).await.unwrap();
        assert!(decision.is_allowed());

        let denied = store.take("key:t3", &buckets, 1).await.unwrap();
        assert!(!denied.is_allowed());

        tokio::time::sleep(Duration::from_millis(120)).await;

        // ~2.4 tokens refilled by now
        let refilled = store.take("key:t3", &buckets, 2).await.unwrap();
        assert!(refilled.is_allowed());
    }

    #[tokio::test]
    async fn test_retry_after_is_minimum_across_failing_buckets() {
        let store = InMemoryRateStore::new();
        let buckets = vec![
            BucketSpec::new(Granularity::Second, 2),
            BucketSpec::new(Granularity::Minute, 2),
        ];

        let decision = store.take("key:t4", &buckets, 2).await.unwrap();
        assert!(decision.is_allowed());

        let denied = store.take("key:t4", &buckets, 2).await.unwrap();
        let retry_after = denied.retry_after().unwrap();
        // The second bucket refills 2 tokens in ~1s; the minute bucket would
        // need ~60s. The caller is told the shorter wait.
        assert!(retry_after <= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_subjects_are_independent() {
        let store = InMemoryRateStore::new();
        let buckets = vec![BucketSpec::new(Granularity::Hour, 1)];

        assert!(store.take("key:a", &buckets, 1).await.unwrap().is_allowed());
        assert!(store.take("ip:203.0.113.7", &buckets, 1).await.unwrap().is_allowed());
        assert!(!store.take("key:a", &buckets, 1).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_reset() {
        let store = InMemoryRateStore::new();
        let buckets = vec![BucketSpec::new(Granularity::Hour, 1)];

        assert!(store.take("key:t5", &buckets, 1).await.unwrap().is_allowed());
        assert!(!store.take("key:t5", &buckets, 1).await.unwrap().is_allowed());

        store.reset("key:t5").await.unwrap();
        assert!(store.take("key:t5", &buckets, 1).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_empty_buckets_allow() {
        let store = InMemoryRateStore::new();
        let decision = store.take("key:t6", &[], 1).await.unwrap();
        assert!(decision.is_allowed());
    }
}
