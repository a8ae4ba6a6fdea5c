//! Gate middleware for the /v1 surface
//!
//! Every gated request runs through the full decision pipeline before its
//! handler. Allowed requests carry a `GateContext` extension with the
//! resolved identity; denials are answered directly with the mapped status
//! and, where applicable, a `Retry-After` header.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::api::middleware::client_ip::client_ip;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::gate::{GateDecision, GateRequest, RequestIdentity};
use crate::infrastructure::upstream::Registry;

/// Identity and budget attached to allowed requests
#[derive(Debug, Clone)]
pub struct GateContext {
    pub identity: RequestIdentity,
    pub remaining: Option<u32>,
}

/// Map a request path to its operation name and upstream dependency.
///
/// Operation names key into the configured cost table; the dependency (when
/// present) is checked against its breaker before the handler runs.
fn classify(path: &str) -> (&'static str, Option<&'static str>) {
    if let Some(rest) = path.strip_prefix("/v1/packages/") {
        return ("read_docs", registry_dependency(rest));
    }

    if let Some(rest) = path.strip_prefix("/v1/rescrape/") {
        return ("rescrape", registry_dependency(rest));
    }

    ("read_docs", None)
}

fn registry_dependency(rest: &str) -> Option<&'static str> {
    rest.split('/')
        .next()
        .and_then(Registry::parse)
        .map(|r| r.dependency_name())
}

pub(crate) fn extract_presented_key(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|key| key.trim().to_string())
}

pub async fn gate_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let source_ip = client_ip(request.headers(), peer, state.trusted_proxy);
    let (operation, dependency) = classify(request.uri().path());

    let mut gate_request = GateRequest::new(source_ip, operation);
    if let Some(key) = extract_presented_key(request.headers()) {
        gate_request = gate_request.with_key(key);
    }
    if let Some(dependency) = dependency {
        gate_request = gate_request.with_dependency(dependency);
    }

    let decision = match state.gate.evaluate(&gate_request).await {
        Ok(decision) => decision,
        Err(e) => {
            // Fail closed: no decision without the store
            error!("Gate evaluation failed: {}", e);
            return ApiError::from(e).into_response();
        }
    };

    match decision {
        GateDecision::Allow {
            identity,
            remaining,
        } => {
            request.extensions_mut().insert(GateContext {
                identity,
                remaining,
            });
            next.run(request).await
        }
        GateDecision::Deny {
            reason,
            retry_after,
        } => ApiError::from_denial(reason, retry_after).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_classify_package_routes() {
        assert_eq!(
            classify("/v1/packages/pypi/requests"),
            ("read_docs", Some("pypi"))
        );
        assert_eq!(
            classify("/v1/packages/github/rust-lang/rust"),
            ("read_docs", Some("github"))
        );
        // Unknown registries still cost a read; the handler rejects them
        assert_eq!(classify("/v1/packages/maven/junit"), ("read_docs", None));
    }

    #[test]
    fn test_classify_operations() {
        assert_eq!(
            classify("/v1/rescrape/pypi/django"),
            ("rescrape", Some("pypi"))
        );
        assert_eq!(classify("/v1/other"), ("read_docs", None));
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            "Bearer mcpd_abc_def".parse().unwrap(),
        );

        assert_eq!(
            extract_presented_key(&headers),
            Some("mcpd_abc_def".to_string())
        );
    }

    #[test]
    fn test_extract_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "mcpd_abc_def".parse().unwrap());

        assert_eq!(
            extract_presented_key(&headers),
            Some("mcpd_abc_def".to_string())
        );
    }

    #[test]
    fn test_bearer_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-bearer".parse().unwrap());
        headers.insert("x-api-key", "from-x-api-key".parse().unwrap());

        assert_eq!(
            extract_presented_key(&headers),
            Some("from-bearer".to_string())
        );
    }

    #[test]
    fn test_no_credentials() {
        let headers = HeaderMap::new();
        assert_eq!(extract_presented_key(&headers), None);
    }
}
