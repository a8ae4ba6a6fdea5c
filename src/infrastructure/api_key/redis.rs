//! Redis-backed API key repository
//!
//! Records are JSON blobs under `key:<key_id>` with no TTL; revocation
//! rewrites the record in place. Usage stats live in a separate
//! `usage:<key_id>` hash driven by HINCRBY, so stamping a use never rewrites
//! the record and cannot race a revoke. `get` merges the two.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::DomainError;
use crate::infrastructure::redis::RedisStore;

const KEY_NAMESPACE: &str = "key";
const USAGE_NAMESPACE: &str = "usage";

#[derive(Debug, Clone)]
pub struct RedisApiKeyRepository {
    store: RedisStore,
}

impl RedisApiKeyRepository {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }

    fn record_key(id: &ApiKeyId) -> String {
        format!("{}:{}", KEY_NAMESPACE, id)
    }

    fn usage_key(id: &ApiKeyId) -> String {
        format!("{}:{}", USAGE_NAMESPACE, id)
    }

    async fn load_usage(
        &self,
        id: &ApiKeyId,
    ) -> Result<Option<(u64, Option<DateTime<Utc>>)>, DomainError> {
        let usage_key = self.store.prefix_key(&Self::usage_key(id));
        let mut conn = self.store.connection();

        let (count, last_used): (Option<u64>, Option<String>) = redis::cmd("HMGET")
            .arg(&usage_key)
            .arg("count")
            .arg("last_used_at")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::store(format!("Failed to load usage for key '{}': {}", id, e))
            })?;

        let Some(count) = count else {
            return Ok(None);
        };

        let last_used_at = last_used
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Some((count, last_used_at)))
    }

    fn serialize(api_key: &ApiKey) -> Result<String, DomainError> {
        serde_json::to_string(api_key)
            .map_err(|e| DomainError::internal(format!("Failed to serialize API key: {}", e)))
    }

    fn deserialize(raw: &str) -> Result<ApiKey, DomainError> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::internal(format!("Failed to deserialize API key: {}", e)))
    }
}

#[async_trait]
impl ApiKeyRepository for RedisApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let Some(raw) = self.store.get_raw(&Self::record_key(id)).await? else {
            return Ok(None);
        };

        let api_key = Self::deserialize(&raw)?;
        match self.load_usage(id).await? {
            Some((count, last_used_at)) => Ok(Some(api_key.with_usage(count, last_used_at))),
            None => Ok(Some(api_key)),
        }
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let record_key = Self::record_key(api_key.id());

        if self.store.exists(&record_key).await? {
            return Err(DomainError::conflict(format!(
                "API key '{}' already exists",
                api_key.id()
            )));
        }

        self.store
            .set_raw(&record_key, &Self::serialize(&api_key)?)
            .await?;

        Ok(api_key)
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let record_key = Self::record_key(api_key.id());

        if !self.store.exists(&record_key).await? {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                api_key.id()
            )));
        }

        self.store
            .set_raw(&record_key, &Self::serialize(api_key)?)
            .await?;

        Ok(api_key.clone())
    }

    async fn record_usage(&self, id: &ApiKeyId) -> Result<(), DomainError> {
        if !self.store.exists(&Self::record_key(id)).await? {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            )));
        }

        let usage_key = self.store.prefix_key(&Self::usage_key(id));
        let mut conn = self.store.connection();

        let _: () = redis::pipe()
            .hincr(&usage_key, "count", 1)
            .ignore()
            .hset(&usage_key, "last_used_at", Utc::now().to_rfc3339())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::store(format!("Failed to record usage for key '{}': {}", id, e))
            })?;

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        let pattern = format!("{}:*", KEY_NAMESPACE);
        let record_keys = self.store.scan_keys(&pattern).await?;

        let mut found = Vec::new();
        for record_key in record_keys {
            // scan_keys returns prefixed names; strip back to the bare id
            let Some((_, raw_id)) = record_key.rsplit_once(&format!("{}:", KEY_NAMESPACE)) else {
                continue;
            };
            let Ok(id) = ApiKeyId::new(raw_id) else {
                continue;
            };

            if let Some(api_key) = self.get(&id).await? {
                if api_key.owner_id() == owner_id {
                    found.push(api_key);
                }
            }
        }

        Ok(found)
    }
}
