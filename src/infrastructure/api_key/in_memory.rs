//! In-memory API key repository implementation
//!
//! Single-process backing for local development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: Arc<RwLock<HashMap<String, ApiKey>>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository seeded with keys
    pub async fn with_keys(keys: Vec<ApiKey>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.keys.write().await;
            for key in keys {
                map.insert(key.id().as_str().to_string(), key);
            }
        }
        repo
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.get(id.as_str()).cloned())
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
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
        let mut keys = self.keys.write().await;
        let id = api_key.id().as_str().to_string();

        if !keys.contains_key(&id) {
            return Err(DomainError::not_found(format!("API key '{}' not found", id)));
        }

        keys.insert(id, api_key.clone());
        Ok(api_key.clone())
    }

    async fn record_usage(&self, id: &ApiKeyId) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;
        match keys.get_mut(id.as_str()) {
            Some(api_key) => {
                api_key.record_usage();
                Ok(())
            }
            None => Err(DomainError::not_found(format!("API key '{}' not found", id))),
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .filter(|k| k.owner_id() == owner_id)
            .cloned()
            .collect())
    }
}
