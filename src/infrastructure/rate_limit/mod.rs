//! Rate limiting infrastructure - stores and the role-tier limiter

mod in_memory;
mod limiter;
mod redis;

pub use in_memory::InMemoryRateStore;
pub use limiter::RateLimiter;
pub use redis::RedisRateStore;
