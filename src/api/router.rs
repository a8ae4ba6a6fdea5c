use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::admin::api_keys;
use super::health;
use super::middleware::gate_middleware;
use super::state::AppState;
use super::v1;

/// Create the full router with application state.
///
/// The gate middleware is a route layer on the /v1 surface only; health and
/// admin endpoints never consume rate budget. The returned router must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()` so peer
/// addresses are available.
pub fn create_router_with_state(state: AppState) -> Router {
    let gated = Router::new()
        .route(
            "/v1/packages/{registry}/{*name}",
            get(v1::packages::get_package),
        )
        .route(
            "/v1/rescrape/{registry}/{*name}",
            post(v1::rescrape::rescrape_package),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gate_middleware,
        ));

    let admin = Router::new()
        .route(
            "/admin/keys",
            get(api_keys::list_keys).post(api_keys::create_key),
        )
        .route(
            "/admin/keys/{id}",
            get(api_keys::get_key).delete(api_keys::revoke_key),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .merge(gated)
        .merge(admin)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}
