//! Circuit breaker domain - per-dependency failure state machine

mod breaker;

pub use breaker::{BreakerSettings, CircuitBreaker, CircuitState};
