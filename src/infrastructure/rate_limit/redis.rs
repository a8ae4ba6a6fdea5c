//! Redis-backed rate store
//!
//! All buckets for a subject are consumed in one Lua script so the check is
//! atomic across granularities: either every bucket pays the cost, or none
//! does. Bucket keys are `rate:<subject>:<granularity>` hashes holding the
//! fractional token balance and the last refill timestamp, with a TTL of one
//! window so idle subjects cost nothing.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::Script;

use crate::domain::rate_limit::{BucketSpec, RateDecision, RateStore};
use crate::domain::DomainError;
use crate::infrastructure::redis::RedisStore;

const RATE_NAMESPACE: &str = "rate";

// Returns {1, min_remaining} on allow, {0, wait_ms} on deny. Refill is
// continuous: tokens = min(cap, tokens + elapsed * rate). A denial consumes
// nothing, and the reported wait is the smallest across failing buckets.
static TAKE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local now = tonumber(ARGV[1])
local cost = tonumber(ARGV[2])
local allowed = true
local min_wait_ms = -1
local min_remaining = -1
local balances = {}

for i = 1, #KEYS do
  local base = 2 + (i - 1) * 3
  local cap = tonumber(ARGV[base + 1])
  local refill_per_ms = tonumber(ARGV[base + 2])

  local state = redis.call('HMGET', KEYS[i], 'tokens', 'ts')
  local tokens = tonumber(state[1])
  local ts = tonumber(state[2])
  if tokens == nil or ts == nil then
    tokens = cap
    ts = now
  end

  local elapsed = now - ts
  if elapsed < 0 then
    elapsed = 0
  end
  tokens = math.min(cap, tokens + elapsed * refill_per_ms)
  balances[i] = tokens

  if tokens < cost then
    allowed = false
    local wait = (cost - tokens) / refill_per_ms
    if min_wait_ms < 0 or wait < min_wait_ms then
      min_wait_ms = wait
    end
  end
end

if not allowed then
  return {0, math.ceil(min_wait_ms)}
end

for i = 1, #KEYS do
  local base = 2 + (i - 1) * 3
  local ttl_ms = tonumber(ARGV[base + 3])
  local remaining = balances[i] - cost
  redis.call('HSET', KEYS[i], 'tokens', remaining, 'ts', ARGV[1])
  redis.call('PEXPIRE', KEYS[i], ttl_ms)
  if min_remaining < 0 or remaining < min_remaining then
    min_remaining = remaining
  end
end

return {1, math.floor(min_remaining)}
"#,
    )
});

#[derive(Debug, Clone)]
pub struct RedisRateStore {
    store: RedisStore,
}

impl RedisRateStore {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }

    fn bucket_key(&self, subject: &str, spec: &BucketSpec) -> String {
        self.store.prefix_key(&format!(
            "{}:{}:{}",
            RATE_NAMESPACE,
            subject,
            spec.granularity.as_str()
        ))
    }

    fn now_ms() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RateStore for RedisRateStore {
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

        let mut invocation = TAKE_SCRIPT.prepare_invoke();
        for spec in buckets {
            invocation.key(self.bucket_key(subject, spec));
        }

        invocation.arg(Self::now_ms() as u64).arg(cost);
        for spec in buckets {
            let refill_per_ms = spec.refill_per_second() / 1000.0;
            invocation
                .arg(spec.capacity)
                .arg(refill_per_ms)
                .arg(spec.granularity.window().as_millis() as u64);
        }

        let mut conn = self.store.connection();
        let (allowed, value): (i64, i64) = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| DomainError::store(format!("Rate script failed: {}", e)))?;

        if allowed == 1 {
            Ok(RateDecision::Allowed {
                remaining: value.max(0) as u32,
            })
        } else {
            Ok(RateDecision::Denied {
                retry_after: std::time::Duration::from_millis(value.max(1) as u64),
            })
        }
    }

    async fn reset(&self, subject: &str) -> Result<(), DomainError> {
        let pattern = format!("{}:{}:*", RATE_NAMESPACE, subject);
        self.store.delete_pattern(&pattern).await?;
        Ok(())
    }
}
