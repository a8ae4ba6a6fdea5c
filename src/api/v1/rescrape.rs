//! Forced re-fetch endpoint
//!
//! Bypasses any cached copy and pulls fresh metadata from the registry. The
//! gate charges this operation at its configured cost (well above a plain
//! read), and only roles carrying the `Rescrape` capability may trigger it.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use tracing::info;

use crate::api::middleware::GateContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{policy, Capability};
use crate::infrastructure::breaker::GuardedCall;
use crate::infrastructure::upstream::{PackageMetadata, Registry};

/// POST /v1/rescrape/{registry}/{name}
pub async fn rescrape_package(
    State(state): State<AppState>,
    Extension(gate): Extension<GateContext>,
    Path((registry, name)): Path<(String, String)>,
) -> Result<Json<PackageMetadata>, ApiError> {
    if !policy::has_capability(gate.identity.role(), Capability::Rescrape) {
        return Err(ApiError::forbidden(
            "Re-scraping requires a developer or admin key",
        ));
    }

    let registry = Registry::parse(&registry)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown registry '{}'", registry)))?;

    info!(
        "Re-scrape of {}/{} requested by {}",
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
