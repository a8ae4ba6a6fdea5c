//! Circuit breaker infrastructure - per-dependency registry

mod registry;

pub use registry::{BreakerRegistry, GuardedCall};
