//! API Key repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{ApiKey, ApiKeyId};
use crate::domain::DomainError;

/// Repository trait for API key metadata.
///
/// Key records have no TTL and are never deleted; revocation rewrites the
/// record with the flag set.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Get a key by its identifier
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Store a newly issued key
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Rewrite an existing key record
    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError>;

    /// Bump the key's usage counter and last-used timestamp.
    ///
    /// Touches only the usage stats, never the rest of the record, so a
    /// concurrent revoke cannot be lost to a stale rewrite.
    async fn record_usage(&self, id: &ApiKeyId) -> Result<(), DomainError>;

    /// List all keys belonging to an owner
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError>;

    /// Check if a key exists
    async fn exists(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Mock repository whose failure mode can be toggled, for exercising
    /// store-unavailable paths
    #[derive(Debug, Default)]
    pub struct MockApiKeyRepository {
        keys: Arc<RwLock<HashMap<String, ApiKey>>>,
        should_fail: Arc<RwLock<bool>>,
    }

    impl MockApiKeyRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn set_should_fail(&self, fail: bool) {
            *self.should_fail.write().await = fail;
        }

        async fn check_should_fail(&self) -> Result<(), DomainError> {
            if *self.should_fail.read().await {
                return Err(DomainError::store("mock repository configured to fail"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ApiKeyRepository for MockApiKeyRepository {
        async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
            self.check_should_fail().await?;
            let keys = self.keys.read().await;
            Ok(keys.get(id.as_str()).cloned())
        }

        async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
            self.check_should_fail().await?;
            let mut keys = self.keys.write().await;
            let id = api_key.id().as_str().to_string();

            if keys.contains_key(&id) {
                return Err(DomainError::conflict(format!(
                    "API key '{}' already exists",
                    id
                )));
            }

            keys.insert(id, api_key.clone());
            Ok(api_key)
        }

        async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
            self.check_should_fail().await?;
            let mut keys = self.keys.write().await;
            let id = api_key.id().as_str().to_string();

            if !keys.contains_key(&id) {
                return Err(DomainError::not_found(format!("API key '{}' not found", id)));
            }

            keys.insert(id, api_key.clone());
            Ok(api_key.clone())
        }

        async fn record_usage(&self, id: &ApiKeyId) -> Result<(), DomainError> {
            self.check_should_fail().await?;
            let mut keys = self.keys.write().await;
            match keys.get_mut(id.as_str()) {
                Some(api_key) => {
                    api_key.record_usage();
                    Ok(())
                }
                None => Err(DomainError::not_found(format!(
                    "API key '{}' not found",
                    id
                ))),
            }
        }

        async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError> {
            self.check_should_fail().await?;
            let keys = self.keys.read().await;
            Ok(keys
                .values()
                .filter(|k| k.owner_id() == owner_id)
                .cloned()
                .collect())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::api_key::{KeyType, Role};

        fn test_key(id: &str, owner: &str) -> ApiKey {
            let key_id = ApiKeyId::new(id).unwrap();
            ApiKey::new(key_id, owner, Role::Basic, KeyType::Standard, "sha256$x")
        }

        #[tokio::test]
        async fn test_create_and_get() {
            let repo = MockApiKeyRepository::new();
            let key = test_key("abc123", "alice");

            repo.create(key.clone()).await.unwrap();

            let found = repo.get(key.id()).await.unwrap();
            assert!(found.is_some());
            assert_eq!(found.unwrap().owner_id(), "alice");
        }

        #[tokio::test]
        async fn test_create_duplicate_conflicts() {
            let repo = MockApiKeyRepository::new();
            repo.create(test_key("abc123", "alice")).await.unwrap();

            let err = repo.create(test_key("abc123", "bob")).await.unwrap_err();
            assert!(matches!(err, DomainError::Conflict { .. }));
        }

        #[tokio::test]
        async fn test_update_missing_fails() {
            let repo = MockApiKeyRepository::new();
            let key = test_key("abc123", "alice");

            let err = repo.update(&key).await.unwrap_err();
            assert!(matches!(err, DomainError::NotFound { .. }));
        }

        #[tokio::test]
        async fn test_list_by_owner() {
            let repo = MockApiKeyRepository::new();
            repo.create(test_key("k1", "alice")).await.unwrap();
            repo.create(test_key("k2", "alice")).await.unwrap();
            repo.create(test_key("k3", "bob")).await.unwrap();

            let keys = repo.list_by_owner("alice").await.unwrap();
            assert_eq!(keys.len(), 2);
        }

        #[tokio::test]
        async fn test_failure_mode() {
            let repo = MockApiKeyRepository::new();
            repo.set_should_fail(true).await;

            let id = ApiKeyId::new("abc123").unwrap();
            let err = repo.get(&id).await.unwrap_err();
            assert!(err.is_store_unavailable());
        }
    }
}
