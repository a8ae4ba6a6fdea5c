//! Gate request and decision types
//!
//! Every denial path is a value, not an error. The only thing that can fail
//! the gate is the shared store going away, and that surfaces as
//! `DomainError::Store` from the evaluating service.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

use crate::domain::api_key::{ApiKey, Role};
use crate::domain::rate_limit::Subject;

/// What the gate is asked about: one inbound request's identifying material
#[derive(Debug, Clone)]
pub struct GateRequest {
    /// Raw API key material from the request headers, if any
    pub presented_key: Option<String>,
    /// Source address as reported by the transport (unparsed; the gate
    /// validates it before any lookup)
    pub source_ip: String,
    /// Operation name used for cost lookup (e.g. "read_docs", "rescrape")
    pub operation: String,
    /// Upstream dependency this request will call, if any
    pub dependency: Option<String>,
}

impl GateRequest {
    pub fn new(source_ip: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            presented_key: None,
            source_ip: source_ip.into(),
            operation: operation.into(),
            dependency: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.presented_key = Some(key.into());
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependency = Some(dependency.into());
        self
    }
}

/// Who the request turned out to be
#[derive(Debug, Clone)]
pub enum RequestIdentity {
    /// Valid API key; carries the full metadata
    Authenticated(Box<ApiKey>),
    /// No (or invalid) credentials; tracked by source address
    Anonymous(IpAddr),
}

impl RequestIdentity {
    pub fn role(&self) -> Role {
        match self {
            Self::Authenticated(key) => key.role(),
            Self::Anonymous(_) => Role::Anonymous,
        }
    }

    pub fn subject(&self) -> Subject {
        match self {
            Self::Authenticated(key) => Subject::Key(key.id().clone()),
            Self::Anonymous(addr) => Subject::Ip(*addr),
        }
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        match self {
            Self::Authenticated(key) => Some(key),
            Self::Anonymous(_) => None,
        }
    }
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Key material or source address failed syntactic validation
    MalformedRequest,
    /// Key absent where required, unknown, revoked, expired, or outside
    /// its IP allowlist
    Unauthenticated,
    /// One or more rate buckets exhausted
    RateLimited,
    /// Circuit open for the declared dependency
    DependencyUnavailable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "malformed_request",
            Self::Unauthenticated => "unauthenticated",
            Self::RateLimited => "rate_limited",
            Self::DependencyUnavailable => "dependency_unavailable",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The gate's answer
#[derive(Debug, Clone)]
pub enum GateDecision {
    Allow {
        identity: RequestIdentity,
        /// Smallest remaining bucket balance, when the role is limited
        remaining: Option<u32>,
    },
    Deny {
        reason: DenyReason,
        retry_after: Option<Duration>,
    },
}

impl GateDecision {
    pub fn allow(identity: RequestIdentity, remaining: Option<u32>) -> Self {
        Self::Allow {
            identity,
            remaining,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self::Deny {
            reason,
            retry_after: None,
        }
    }

    pub fn deny_with_retry(reason: DenyReason, retry_after: Duration) -> Self {
        Self::Deny {
            reason,
            retry_after: Some(retry_after),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::{ApiKeyId, KeyType};

    #[test]
    fn test_anonymous_identity() {
        let identity = RequestIdentity::Anonymous("203.0.113.7".parse().unwrap());
        assert_eq!(identity.role(), Role::Anonymous);
        assert_eq!(identity.subject().as_store_id(), "ip:203.0.113.7");
        assert!(identity.api_key().is_none());
    }

    #[test]
    fn test_authenticated_identity() {
        let key = ApiKey::new(
            ApiKeyId::new("Zk3mPqw9").unwrap(),
            "alice",
            Role::Premium,
            KeyType::Standard,
            "sha256$x",
        );
        let identity = RequestIdentity::Authenticated(Box::new(key));
        assert_eq!(identity.role(), Role::Premium);
        assert_eq!(identity.subject().as_store_id(), "key:Zk3mPqw9");
        assert!(identity.api_key().is_some());
    }

    #[test]
    fn test_decision_helpers() {
        let identity = RequestIdentity::Anonymous("203.0.113.7".parse().unwrap());
        assert!(GateDecision::allow(identity, Some(3)).is_allowed());

        let deny = GateDecision::deny_with_retry(DenyReason::RateLimited, Duration::from_secs(2));
        assert!(!deny.is_allowed());
        match deny {
            GateDecision::Deny {
                reason,
                retry_after,
            } => {
                assert_eq!(reason, DenyReason::RateLimited);
                assert_eq!(retry_after, Some(Duration::from_secs(2)));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(DenyReason::Unauthenticated.as_str(), "unauthenticated");
        assert_eq!(
            DenyReason::DependencyUnavailable.as_str(),
            "dependency_unavailable"
        );
    }
}
