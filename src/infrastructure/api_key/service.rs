//! API key service
//!
//! High-level operations for issuing, validating and revoking keys.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use ipnet::IpNet;
use tracing::{debug, info, warn};

use crate::domain::api_key::{
    policy, ApiKey, ApiKeyId, ApiKeyRepository, Capability, KeyType, Role,
};
use crate::domain::DomainError;

use super::generator::ApiKeyGenerator;

/// Result of issuing a new API key
#[derive(Debug)]
pub struct IssuedKey {
    /// The stored key metadata (never contains the secret)
    pub api_key: ApiKey,
    /// The full key string; shown once and never recoverable afterwards
    pub secret: String,
}

/// Parameters for issuing a key
#[derive(Debug, Clone, Default)]
pub struct IssueRequest {
    pub owner_id: String,
    pub role: Role,
    pub key_type: KeyType,
    pub ip_allowlist: Vec<IpNet>,
    pub description: Option<String>,
    /// Validity window in days; `None` means the key does not expire
    pub expires_in_days: Option<i64>,
}

/// Service for API key lifecycle and validation
#[derive(Debug)]
pub struct AuthService {
    repository: Arc<dyn ApiKeyRepository>,
    generator: ApiKeyGenerator,
}

impl AuthService {
    pub fn new(repository: Arc<dyn ApiKeyRepository>) -> Self {
        Self {
            repository,
            generator: ApiKeyGenerator::new(),
        }
    }

    /// Issue a new key; the returned secret is shown exactly once
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedKey, DomainError> {
        let generated = self.generator.generate();
        let key_id = ApiKeyId::new(generated.key_id.as_str())
            .map_err(|e| DomainError::internal(format!("Generated invalid key id: {}", e)))?;

        info!(
            "Issuing API key: id={}, owner={}, role={}",
            key_id, request.owner_id, request.role
        );

        let mut api_key = ApiKey::new(
            key_id,
            request.owner_id,
            request.role,
            request.key_type,
            generated.hash,
        )
        .with_ip_allowlist(request.ip_allowlist);

        if let Some(description) = request.description {
            api_key = api_key.with_description(description);
        }

        if let Some(days) = request.expires_in_days {
            api_key = api_key.with_expiration(Utc::now() + ChronoDuration::days(days));
        }

        let created = self.repository.create(api_key).await?;

        Ok(IssuedKey {
            api_key: created,
            secret: generated.key,
        })
    }

    /// Issue a key with known parts, for deterministic integration tests
    pub async fn issue_with_parts(
        &self,
        key_id: &str,
        secret: &str,
        request: IssueRequest,
    ) -> Result<IssuedKey, DomainError> {
        let generated = self.generator.from_parts(key_id, secret);
        let key_id = ApiKeyId::new(generated.key_id.as_str())
            .map_err(|e| DomainError::validation(format!("Invalid key id: {}", e)))?;

        let mut api_key = ApiKey::new(
            key_id,
            request.owner_id,
            request.role,
            request.key_type,
            generated.hash,
        )
        .with_ip_allowlist(request.ip_allowlist);

        if let Some(days) = request.expires_in_days {
            api_key = api_key.with_expiration(Utc::now() + ChronoDuration::days(days));
        }

        let created = self.repository.create(api_key).await?;

        Ok(IssuedKey {
            api_key: created,
            secret: generated.key,
        })
    }

    /// Get a key by id
    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        self.repository.get(id).await
    }

    /// List all keys belonging to an owner
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list_by_owner(owner_id).await
    }

    /// Validate a presented key against the store.
    ///
    /// Returns `None` for every non-match - unknown id, hash mismatch,
    /// revoked, expired, or source address outside the allowlist. The caller
    /// cannot distinguish these cases, and neither can the client.
    pub async fn validate(
        &self,
        presented: &str,
        source_ip: IpAddr,
    ) -> Result<Option<ApiKey>, DomainError> {
        let Some(key_id) = ApiKeyGenerator::extract_key_id(presented) else {
            debug!("Presented key does not match the three-part format");
            return Ok(None);
        };

        let Ok(key_id) = ApiKeyId::new(key_id) else {
            debug!("Presented key id fails validation");
            return Ok(None);
        };

        let Some(api_key) = self.repository.get(&key_id).await? else {
            debug!("No record for key id {}", key_id);
            return Ok(None);
        };

        if !self.generator.verify_key(presented, api_key.secret_hash()) {
            debug!("Hash verification failed for key id {}", key_id);
            return Ok(None);
        }

        if !api_key.is_valid() {
            debug!(
                "Key id {} is revoked or expired (revoked={}, expired={})",
                key_id,
                api_key.is_revoked(),
                api_key.is_expired()
            );
            return Ok(None);
        }

        if !api_key.allows_ip(source_ip) {
            debug!("Source {} outside allowlist for key id {}", source_ip, key_id);
            return Ok(None);
        }

        // Usage stamping is best-effort; a store hiccup here must not fail
        // an otherwise valid request. The repository bumps the counters in
        // place rather than rewriting the record, so a revoke landing
        // mid-validation is never clobbered by a stale copy.
        if let Err(e) = self.repository.record_usage(&key_id).await {
            warn!("Failed to record usage for key id {}: {}", key_id, e);
            return Ok(Some(api_key));
        }

        let mut stamped = api_key;
        stamped.record_usage();
        Ok(Some(stamped))
    }

    /// Revoke a key. Idempotent: returns `true` only when a live key
    /// transitioned to revoked; `false` when it already was, or never existed.
    pub async fn revoke(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        info!("Revoking API key: id={}", id);

        let Some(mut api_key) = self.repository.get(id).await? else {
            return Ok(false);
        };

        if api_key.is_revoked() {
            return Ok(false);
        }

        api_key.revoke();
        self.repository.update(&api_key).await?;
        Ok(true)
    }

    /// Whether a key's role grants a capability
    pub fn has_capability(&self, api_key: &ApiKey, capability: Capability) -> bool {
        policy::has_capability(api_key.role(), capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::api_key::InMemoryApiKeyRepository;

    fn test_ip() -> IpAddr {
        "203.0.113.7".parse().unwrap()
    }

    fn create_service() -> AuthService {
        AuthService::new(Arc::new(InMemoryApiKeyRepository::new()))
    }

    fn basic_request(owner: &str) -> IssueRequest {
        IssueRequest {
            owner_id: owner.to_string(),
            role: Role::Basic,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let service = create_service();
        let issued = service.issue(basic_request("alice")).await.unwrap();

        assert!(issued.secret.starts_with("mcpd_"));
        assert_eq!(issued.api_key.owner_id(), "alice");

        let validated = service.validate(&issued.secret, test_ip()).await.unwrap();
        assert!(validated.is_some());
        assert_eq!(validated.unwrap().role(), Role::Basic);
    }

    #[tokio::test]
    async fn test_validate_unknown_key() {
        let service = create_service();
        let result = service
            .validate("mcpd_unknownid_somesecret", test_ip())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_validate_malformed_key() {
        let service = create_service();
        let result = service.validate("not-a-key", test_ip()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_validate_wrong_secret() {
        let service = create_service();
        let issued = service.issue(basic_request("alice")).await.unwrap();

        let forged = format!("mcpd_{}_forgedsecret", issued.api_key.id());
        let result = service.validate(&forged, test_ip()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_validate_revoked_key() {
        let service = create_service();
        let issued = service.issue(basic_request("alice")).await.unwrap();

        service.revoke(issued.api_key.id()).await.unwrap();

        let result = service.validate(&issued.secret, test_ip()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let service = create_service();
        let issued = service.issue(basic_request("alice")).await.unwrap();

        assert!(service.revoke(issued.api_key.id()).await.unwrap());
        assert!(!service.revoke(issued.api_key.id()).await.unwrap());

        let stored = service.get(issued.api_key.id()).await.unwrap().unwrap();
        assert!(stored.is_revoked());
    }

    #[tokio::test]
    async fn test_revoke_missing_key_is_false() {
        let service = create_service();
        let id = ApiKeyId::new("missing").unwrap();

        assert!(!service.revoke(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_key_rejected() {
        let service = create_service();
        let request = IssueRequest {
            owner_id: "alice".to_string(),
            role: Role::Basic,
            expires_in_days: Some(-1),
            ..Default::default()
        };
        let issued = service.issue(request).await.unwrap();

        let result = service.validate(&issued.secret, test_ip()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_ip_allowlist_enforced() {
        let service = create_service();
        let request = IssueRequest {
            owner_id: "alice".to_string(),
            role: Role::Basic,
            ip_allowlist: vec!["10.0.0.0/8".parse().unwrap()],
            ..Default::default()
        };
        let issued = service.issue(request).await.unwrap();

        let inside = service
            .validate(&issued.secret, "10.1.2.3".parse().unwrap())
            .await
            .unwrap();
        assert!(inside.is_some());

        let outside = service.validate(&issued.secret, test_ip()).await.unwrap();
        assert!(outside.is_none());
    }

    #[tokio::test]
    async fn test_usage_stamp_recorded() {
        let service = create_service();
        let issued = service.issue(basic_request("alice")).await.unwrap();

        service.validate(&issued.secret, test_ip()).await.unwrap();
        service.validate(&issued.secret, test_ip()).await.unwrap();

        let stored = service.get(issued.api_key.id()).await.unwrap().unwrap();
        assert_eq!(stored.usage_count(), 2);
        assert!(stored.last_used_at().is_some());
    }

    #[tokio::test]
    async fn test_usage_stamp_cannot_undo_revocation() {
        let repository = Arc::new(InMemoryApiKeyRepository::new());
        let service = AuthService::new(repository.clone());
        let issued = service.issue(basic_request("alice")).await.unwrap();

        assert!(service.revoke(issued.api_key.id()).await.unwrap());

        // A stamp applied after the revoke, as when a revoke lands while a
        // request is mid-validation, must leave the key revoked
        repository.record_usage(issued.api_key.id()).await.unwrap();

        let stored = service.get(issued.api_key.id()).await.unwrap().unwrap();
        assert!(stored.is_revoked());
        assert_eq!(stored.usage_count(), 1);

        let result = service.validate(&issued.secret, test_ip()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_capability_check() {
        let service = create_service();
        let admin = service
            .issue(IssueRequest {
                owner_id: "root".to_string(),
                role: Role::Admin,
                ..Default::default()
            })
            .await
            .unwrap();
        let basic = service.issue(basic_request("alice")).await.unwrap();

        assert!(service.has_capability(&admin.api_key, Capability::ManageKeys));
        assert!(!service.has_capability(&basic.api_key, Capability::ManageKeys));
    }
}
