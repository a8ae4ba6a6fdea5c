//! API key infrastructure - generation, storage adapters, auth service

mod generator;
mod in_memory;
mod redis;
mod service;

pub use generator::{ApiKeyGenerator, GeneratedApiKey, KEY_PREFIX};
pub use in_memory::InMemoryApiKeyRepository;
pub use redis::RedisApiKeyRepository;
pub use service::{AuthService, IssueRequest, IssuedKey};
