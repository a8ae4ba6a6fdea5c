//! Infrastructure layer - adapters behind the domain's traits

pub mod api_key;
pub mod breaker;
pub mod gate;
pub mod logging;
pub mod rate_limit;
pub mod redis;
pub mod upstream;
