//! API Key domain - entity, policy table, repository contract

mod entity;
pub mod policy;
mod repository;
mod validation;

pub use entity::{ApiKey, ApiKeyId, KeyType, Role};
pub use policy::{Capability, RolePolicy, ROLE_POLICIES};
pub use repository::ApiKeyRepository;
pub use validation::{
    validate_key_id, validate_presented_key, ApiKeyValidationError, MAX_KEY_LENGTH,
};

#[cfg(test)]
pub use repository::mock::MockApiKeyRepository;
