//! Rate limiting domain - token buckets over the shared store

mod store;
mod types;

pub use store::RateStore;
pub use types::{BucketSpec, Granularity, RateDecision, RoleLimits, Subject};
