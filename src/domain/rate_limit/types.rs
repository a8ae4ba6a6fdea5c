//! Rate limiting types

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::api_key::ApiKeyId;

/// Time-window size a bucket refills over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
}

impl Granularity {
    /// Window length for this granularity
    pub fn window(&self) -> Duration {
        match self {
            Self::Second => Duration::from_secs(1),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3600),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One token bucket to check: capacity over a granularity window.
///
/// Refill is continuous at `capacity / window` tokens per second, up to
/// `capacity`. Continuous refill avoids the 2x burst a fixed window allows
/// at its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
    pub granularity: Granularity,
    pub capacity: u32,
}

impl BucketSpec {
    pub fn new(granularity: Granularity, capacity: u32) -> Self {
        Self {
            granularity,
            capacity,
        }
    }

    /// Tokens added per second
    pub fn refill_per_second(&self) -> f64 {
        self.capacity as f64 / self.granularity.window().as_secs_f64()
    }
}

/// Per-role bucket capacities. `None` means unlimited at that granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_second: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_hour: Option<u32>,
}

impl RoleLimits {
    pub fn new(per_second: Option<u32>, per_minute: Option<u32>, per_hour: Option<u32>) -> Self {
        Self {
            per_second,
            per_minute,
            per_hour,
        }
    }

    /// No limits at any granularity
    pub fn unlimited() -> Self {
        Self {
            per_second: None,
            per_minute: None,
            per_hour: None,
        }
    }

    /// The buckets a request must pass through, one per configured granularity
    pub fn buckets(&self) -> Vec<BucketSpec> {
        let mut specs = Vec::with_capacity(3);
        if let Some(cap) = self.per_second {
            specs.push(BucketSpec::new(Granularity::Second, cap));
        }
        if let Some(cap) = self.per_minute {
            specs.push(BucketSpec::new(Granularity::Minute, cap));
        }
        if let Some(cap) = self.per_hour {
            specs.push(BucketSpec::new(Granularity::Hour, cap));
        }
        specs
    }

    pub fn is_unlimited(&self) -> bool {
        self.per_second.is_none() && self.per_minute.is_none() && self.per_hour.is_none()
    }
}

/// The identity a rate limit is tracked against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// An authenticated API key
    Key(ApiKeyId),
    /// An unauthenticated caller, tracked by source address
    Ip(IpAddr),
}

impl Subject {
    /// Stable identifier used in store keys
    pub fn as_store_id(&self) -> String {
        match self {
            Self::Key(id) => format!("key:{}", id),
            Self::Ip(addr) => format!("ip:{}", addr),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_store_id())
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted; `remaining` is the smallest post-consumption balance
    /// across the checked buckets
    Allowed { remaining: u32 },
    /// Request denied; wait at least `retry_after` before retrying
    Denied { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Allowed { .. } => None,
            Self::Denied { retry_after } => Some(*retry_after),
        }
    }
}
