//! Domain layer - entities, policies and ports
//!
//! Everything here is storage-agnostic. The infrastructure layer provides
//! the Redis and in-memory adapters behind the traits declared in this tree.

pub mod api_key;
pub mod breaker;
pub mod error;
pub mod gate;
pub mod rate_limit;

pub use error::DomainError;
