//! API Key entity and related types

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::validation::{validate_key_id, ApiKeyValidationError};

/// API Key identifier - the derived lookup id, never the secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKeyId(String);

impl ApiKeyId {
    /// Create a new ApiKeyId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, ApiKeyValidationError> {
        let id = id.into();
        validate_key_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApiKeyId {
    type Error = ApiKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiKeyId> for String {
    fn from(id: ApiKeyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access roles, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Anonymous,
    Basic,
    Premium,
    Developer,
    Admin,
}

impl Role {
    /// Whether this role is at least as privileged as `required`
    pub fn at_least(&self, required: Role) -> bool {
        *self >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Developer => "developer",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Issued to an individual caller
    #[default]
    Standard,
    /// Issued to automated integrations
    ServiceAccount,
}

/// API Key entity
///
/// The secret itself is never stored; `secret_hash` holds a sha256 digest of
/// the full presented key. Keys are never physically deleted - revocation
/// flips a one-way flag so the audit trail survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    id: ApiKeyId,
    /// Owner this key was issued to
    owner_id: String,
    role: Role,
    key_type: KeyType,
    /// Hash of the full key, format `sha256$<urlsafe-b64>`
    secret_hash: String,
    /// When non-empty, requests must originate from one of these networks
    #[serde(default)]
    ip_allowlist: Vec<IpNet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    revoked: bool,
    /// Fixed at issue time; expired keys fail validation but stay stored
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    usage_count: u64,
}

impl ApiKey {
    /// Create a new active API key
    pub fn new(
        id: ApiKeyId,
        owner_id: impl Into<String>,
        role: Role,
        key_type: KeyType,
        secret_hash: impl Into<String>,
    ) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            role,
            key_type,
            secret_hash: secret_hash.into(),
            ip_allowlist: Vec::new(),
            description: None,
            revoked: false,
            expires_at: None,
            created_at: Utc::now(),
            last_used_at: None,
            usage_count: 0,
        }
    }

    /// Restrict the key to the given networks
    pub fn with_ip_allowlist(mut self, allowlist: Vec<IpNet>) -> Self {
        self.ip_allowlist = allowlist;
        self
    }

    /// Set a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set an expiration timestamp
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Attach usage stats that a backend tracks outside the record
    pub fn with_usage(mut self, usage_count: u64, last_used_at: Option<DateTime<Utc>>) -> Self {
        self.usage_count = usage_count;
        self.last_used_at = last_used_at;
        self
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn ip_allowlist(&self) -> &[IpNet] {
        &self.ip_allowlist
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    // Status checks

    /// Check if the key has passed its expiration timestamp
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Check if the key is currently usable (not revoked, not expired)
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_expired()
    }

    /// Check whether a source address satisfies the allowlist.
    ///
    /// An empty allowlist places no restriction.
    pub fn allows_ip(&self, addr: IpAddr) -> bool {
        if self.ip_allowlist.is_empty() {
            return true;
        }
        self.ip_allowlist.iter().any(|net| net.contains(&addr))
    }

    // Mutators

    /// Revoke the key. One-way: there is no un-revoke.
    pub fn revoke(&mut self) {
        self.revoked = true;
    }

    /// Record a successful use of the key
    pub fn record_usage(&mut self) {
        self.usage_count += 1;
        self.last_used_at = Some(Utc::now());
    }
}
