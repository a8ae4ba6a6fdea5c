//! Health check endpoints for liveness and readiness probes

use std::collections::HashMap;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::domain::breaker::CircuitState;

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakers: Option<HashMap<String, &'static str>>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Liveness probe - 200 whenever the process is running
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        breakers: None,
    };

    (StatusCode::OK, Json(response))
}

/// Readiness probe - verifies the shared store and reports breaker states.
///
/// An unreachable store is Unhealthy (the gate fails closed without it); an
/// open breaker only degrades, the service still serves everything else.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = Vec::new();
    let mut overall_status = HealthStatus::Healthy;

    if let Some(redis) = &state.redis {
        let start = Instant::now();
        let (status, message) = match redis.ping().await {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
        };

        if status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }

        checks.push(HealthCheck {
            name: "redis".to_string(),
            status,
            message,
            latency_ms: Some(start.elapsed().as_millis() as u64),
        });
    }

    let breakers: HashMap<String, &'static str> = state
        .breakers
        .snapshot()
        .into_iter()
        .map(|(name, state)| (name, state.as_str()))
        .collect();

    if overall_status == HealthStatus::Healthy
        && breakers.values().any(|s| *s != CircuitState::Closed.as_str())
    {
        overall_status = HealthStatus::Degraded;
    }

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        breakers: Some(breakers),
    };

    (status_code, Json(response))
}
