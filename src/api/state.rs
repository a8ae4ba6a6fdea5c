//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::api_key::AuthService;
use crate::infrastructure::breaker::BreakerRegistry;
use crate::infrastructure::gate::RequestGate;
use crate::infrastructure::redis::RedisStore;
use crate::infrastructure::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub auth: Arc<AuthService>,
    pub breakers: Arc<BreakerRegistry>,
    pub upstream: Arc<UpstreamClient>,
    /// Present only on the Redis backend; readiness pings it
    pub redis: Option<RedisStore>,
    /// Honor forwarding headers for client IP extraction
    pub trusted_proxy: bool,
}
