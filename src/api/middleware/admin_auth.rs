//! Admin authentication extractor
//!
//! Admin endpoints bypass the rate-limiting gate but demand a valid key whose
//! role carries the `ManageKeys` capability.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use tracing::debug;

use crate::api::middleware::client_ip::client_ip;
use crate::api::middleware::gate::extract_presented_key;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{ApiKey, Capability};
use crate::domain::gate::DenyReason;

/// Extractor that requires a key with the `ManageKeys` capability
#[derive(Debug, Clone)]
pub struct RequireManageKeys(pub ApiKey);

impl FromRequestParts<AppState> for RequireManageKeys {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = extract_presented_key(&parts.headers).ok_or_else(|| {
            debug!("Admin request without an API key");
            ApiError::from_denial(DenyReason::Unauthenticated, None)
        })?;

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0)
            .ok_or_else(|| ApiError::internal("Peer address unavailable"))?;

        let source_ip: IpAddr = client_ip(&parts.headers, peer, state.trusted_proxy)
            .parse()
            .map_err(|_| ApiError::bad_request("Unparseable client address"))?;

        debug!(
            key_prefix = %presented.chars().take(8).collect::<String>(),
            "Validating admin API key"
        );

        let api_key = state
            .auth
            .validate(&presented, source_ip)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| {
                debug!("Admin request with a key that failed validation");
                ApiError::from_denial(DenyReason::Unauthenticated, None)
            })?;

        if !state.auth.has_capability(&api_key, Capability::ManageKeys) {
            return Err(ApiError::forbidden("Key management requires an admin key"));
        }

        Ok(RequireManageKeys(api_key))
    }
}
