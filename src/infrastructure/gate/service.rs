//! Request gate
//!
//! Composes validation, authentication, rate limiting and breaker
//! availability into one decision pipeline with a fixed order. Input is
//! validated before anything touches the store; a request that fails
//! validation costs nothing.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use crate::domain::api_key::validate_presented_key;
use crate::domain::gate::{DenyReason, GateDecision, GateRequest, RequestIdentity};
use crate::domain::rate_limit::RateDecision;
use crate::domain::DomainError;
use crate::infrastructure::api_key::AuthService;
use crate::infrastructure::breaker::BreakerRegistry;
use crate::infrastructure::rate_limit::RateLimiter;

const DEFAULT_OPERATION_COST: u32 = 1;

#[derive(Debug)]
pub struct RequestGate {
    auth: Arc<AuthService>,
    limiter: Arc<RateLimiter>,
    breakers: Arc<BreakerRegistry>,
    operation_costs: HashMap<String, u32>,
}

impl RequestGate {
    pub fn new(
        auth: Arc<AuthService>,
        limiter: Arc<RateLimiter>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            auth,
            limiter,
            breakers,
            operation_costs: HashMap::new(),
        }
    }

    /// Set per-operation token costs; unlisted operations cost 1
    pub fn with_operation_costs(mut self, costs: HashMap<String, u32>) -> Self {
        self.operation_costs = costs;
        self
    }

    pub fn operation_cost(&self, operation: &str) -> u32 {
        self.operation_costs
            .get(operation)
            .copied()
            .unwrap_or(DEFAULT_OPERATION_COST)
    }

    /// Evaluate a request through every stage.
    ///
    /// The only error is store unavailability; the caller fails closed on it.
    /// Everything else comes back as a `GateDecision`.
    pub async fn evaluate(&self, request: &GateRequest) -> Result<GateDecision, DomainError> {
        // Stage 1: syntactic validation, before any store lookup
        let Ok(source_ip) = request.source_ip.parse::<IpAddr>() else {
            debug!("Unparseable source address: {}", request.source_ip);
            return Ok(GateDecision::deny(DenyReason::MalformedRequest));
        };

        if let Some(presented) = &request.presented_key {
            if let Err(e) = validate_presented_key(presented) {
                debug!("Malformed key material: {}", e);
                return Ok(GateDecision::deny(DenyReason::MalformedRequest));
            }
        }

        // Stage 2: authentication; invalid or absent credentials fall back
        // to the anonymous tier tracked by source address
        let identity = match &request.presented_key {
            Some(presented) => match self.auth.validate(presented, source_ip).await? {
                Some(api_key) => RequestIdentity::Authenticated(Box::new(api_key)),
                None => RequestIdentity::Anonymous(source_ip),
            },
            None => RequestIdentity::Anonymous(source_ip),
        };

        // Stage 3: rate limit with the role tier and operation cost
        let cost = self.operation_cost(&request.operation);
        let decision = self
            .limiter
            .check(&identity.subject(), identity.role(), cost)
            .await?;

        let remaining = match decision {
            RateDecision::Allowed { remaining } => remaining,
            RateDecision::Denied { retry_after } => {
                return Ok(GateDecision::deny_with_retry(
                    DenyReason::RateLimited,
                    retry_after,
                ));
            }
        };

        // Stage 4: breaker availability for the declared dependency
        if let Some(dependency) = &request.dependency {
            let breaker = self.breakers.breaker(dependency);
            // A zero wait means a half-open trial would be admitted; the
            // guarded call itself decides whether this request is the trial
            let open_wait = breaker
                .retry_after()
                .filter(|wait| *wait > std::time::Duration::ZERO);
            if let Some(retry_after) = open_wait {
                debug!(
                    "Dependency {} unavailable: retry in {}ms",
                    dependency,
                    retry_after.as_millis()
                );
                return Ok(GateDecision::deny_with_retry(
                    DenyReason::DependencyUnavailable,
                    retry_after,
                ));
            }
        }

        let remaining = (remaining != u32::MAX).then_some(remaining);
        Ok(GateDecision::allow(identity, remaining))
    }
}
