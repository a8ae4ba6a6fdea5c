//! Admin endpoints for API key management
//!
//! All handlers require the `ManageKeys` capability via `RequireManageKeys`.
//! The issued secret appears exactly once, in the creation response.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::middleware::RequireManageKeys;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{ApiKey, ApiKeyId, KeyType, Role};
use crate::infrastructure::api_key::IssueRequest;

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub owner_id: String,
    pub role: Role,
    #[serde(default)]
    pub key_type: KeyType,
    #[serde(default)]
    pub ip_allowlist: Vec<IpNet>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
}

/// Key metadata as returned by the API; never includes the hash
#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub id: String,
    pub owner_id: String,
    pub role: Role,
    pub key_type: KeyType,
    pub ip_allowlist: Vec<IpNet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
}

impl From<&ApiKey> for ApiKeyView {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().as_str().to_string(),
            owner_id: key.owner_id().to_string(),
            role: key.role(),
            key_type: key.key_type(),
            ip_allowlist: key.ip_allowlist().to_vec(),
            description: key.description().map(str::to_string),
            revoked: key.is_revoked(),
            expires_at: key.expires_at(),
            created_at: key.created_at(),
            last_used_at: key.last_used_at(),
            usage_count: key.usage_count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedKeyResponse {
    /// The full key; store it now, it cannot be retrieved again
    pub secret: String,
    pub key: ApiKeyView,
}

#[derive(Debug, Deserialize)]
pub struct ListKeysQuery {
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    pub keys: Vec<ApiKeyView>,
}

#[derive(Debug, Serialize)]
pub struct RevokeKeyResponse {
    /// Whether this call performed the revocation (false: already revoked)
    pub revoked: bool,
}

/// POST /admin/keys
pub async fn create_key(
    State(state): State<AppState>,
    RequireManageKeys(admin_key): RequireManageKeys,
    Json(request): Json<CreateKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.owner_id.trim().is_empty() {
        return Err(ApiError::bad_request("owner_id must not be empty"));
    }

    info!(
        "Admin {} issuing {} key for owner {}",
        admin_key.id(),
        request.role,
        request.owner_id
    );

    let issued = state
        .auth
        .issue(IssueRequest {
            owner_id: request.owner_id,
            role: request.role,
            key_type: request.key_type,
            ip_allowlist: request.ip_allowlist,
            description: request.description,
            expires_in_days: request.expires_in_days,
        })
        .await?;

    let response = CreatedKeyResponse {
        secret: issued.secret,
        key: ApiKeyView::from(&issued.api_key),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /admin/keys?owner_id=<owner>
pub async fn list_keys(
    State(state): State<AppState>,
    RequireManageKeys(_): RequireManageKeys,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<ListKeysResponse>, ApiError> {
    let keys = state.auth.list_by_owner(&query.owner_id).await?;

    Ok(Json(ListKeysResponse {
        keys: keys.iter().map(ApiKeyView::from).collect(),
    }))
}

/// GET /admin/keys/{id}
pub async fn get_key(
    State(state): State<AppState>,
    RequireManageKeys(_): RequireManageKeys,
    Path(id): Path<String>,
) -> Result<Json<ApiKeyView>, ApiError> {
    let id = ApiKeyId::new(id).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let key = state
        .auth
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("API key '{}' not found", id)))?;

    Ok(Json(ApiKeyView::from(&key)))
}

/// DELETE /admin/keys/{id}
pub async fn revoke_key(
    State(state): State<AppState>,
    RequireManageKeys(admin_key): RequireManageKeys,
    Path(id): Path<String>,
) -> Result<Json<RevokeKeyResponse>, ApiError> {
    let id = ApiKeyId::new(id).map_err(|e| ApiError::bad_request(e.to_string()))?;

    if state.auth.get(&id).await?.is_none() {
        return Err(ApiError::not_found(format!("API key '{}' not found", id)));
    }

    info!("Admin {} revoking key {}", admin_key.id(), id);

    let revoked = state.auth.revoke(&id).await?;
    Ok(Json(RevokeKeyResponse { revoked }))
}
