//! Package metadata endpoints
//!
//! The gate middleware has already charged the request and checked breaker
//! availability; the handler runs the actual upstream call through the
//! breaker so failures and timeouts feed its state.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use tracing::debug;

use crate::api::middleware::GateContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::infrastructure::breaker::GuardedCall;
use crate::infrastructure::upstream::{PackageMetadata, Registry};

/// GET /v1/packages/{registry}/{name}
///
/// `name` is a wildcard segment so GitHub's `owner/repo` form works.
pub async fn get_package(
    State(state): State<AppState>,
    Extension(gate): Extension<GateContext>,
    Path((registry, name)): Path<(String, String)>,
) -> Result<Json<PackageMetadata>, ApiError> {
    let registry = Registry::parse(&registry)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown registry '{}'", registry)))?;

    debug!(
        "Fetching {}/{} for {}",
        registry,
        name,
        gate.identity.subject()
    );

    let upstream = state.upstream.clone();
    let call = state
        .breakers
        .call(registry.dependency_name(), || async move {
            upstream.fetch_package(registry, &name).await
        })
        .await?;

    match call {
        GuardedCall::Completed(metadata) => Ok(Json(metadata)),
        GuardedCall::Rejected { retry_after } => Err(ApiError::unavailable(format!(
            "{} temporarily unavailable",
            registry
        ))
        .with_retry_after(retry_after)),
    }
}
