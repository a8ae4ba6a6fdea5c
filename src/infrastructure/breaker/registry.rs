//! Per-dependency circuit breaker registry
//!
//! One breaker per upstream dependency name, created lazily from configured
//! settings. `call` wraps an async operation with the breaker's admission
//! check and a call timeout; a timeout counts as a failure.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::breaker::{BreakerSettings, CircuitBreaker, CircuitState};
use crate::domain::DomainError;

/// Outcome of a breaker-guarded call
#[derive(Debug)]
pub enum GuardedCall<T> {
    /// The call ran and succeeded
    Completed(T),
    /// The breaker is open; retry after the given wait
    Rejected { retry_after: Duration },
}

impl<T> GuardedCall<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Rejected { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_settings: BreakerSettings,
    per_dependency: HashMap<String, BreakerSettings>,
}

impl BreakerRegistry {
    pub fn new(
        default_settings: BreakerSettings,
        per_dependency: HashMap<String, BreakerSettings>,
    ) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_settings,
            per_dependency,
        }
    }

    /// The breaker for a dependency, created on first use
    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Ok(breakers) = self.breakers.read() {
            if let Some(breaker) = breakers.get(dependency) {
                return breaker.clone();
            }
        }

        let settings = self
            .per_dependency
            .get(dependency)
            .cloned()
            .unwrap_or_else(|| self.default_settings.clone());

        let mut breakers = match self.breakers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        breakers
            .entry(dependency.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(settings)))
            .clone()
    }

    /// Current state for a dependency without creating a breaker
    pub fn state(&self, dependency: &str) -> Option<CircuitState> {
        self.breakers
            .read()
            .ok()
            .and_then(|breakers| breakers.get(dependency).map(|b| b.state()))
    }

    /// States of every known breaker, for health reporting
    pub fn snapshot(&self) -> HashMap<String, CircuitState> {
        match self.breakers.read() {
            Ok(breakers) => breakers
                .iter()
                .map(|(name, breaker)| (name.clone(), breaker.state()))
                .collect(),
            Err(_) => HashMap::new(),
        }
    }

    /// Run a fallible call through the dependency's breaker.
    ///
    /// A slow call past the configured timeout is recorded as a failure, the
    /// same as an error result.
    pub async fn call<T, F, Fut>(
        &self,
        dependency: &str,
        operation: F,
    ) -> Result<GuardedCall<T>, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let breaker = self.breaker(dependency);

        if let Err(retry_after) = breaker.try_acquire() {
            debug!(
                "Circuit open for {}: retry in {}ms",
                dependency,
                retry_after.as_millis()
            );
            return Ok(GuardedCall::Rejected { retry_after });
        }

        let timeout = breaker.settings().call_timeout;
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => {
                breaker.record_success();
                Ok(GuardedCall::Completed(value))
            }
            Ok(Err(e)) => {
                // Only outage-shaped errors count against the breaker; a
                // dependency that answered with a domain-level miss is up
                if matches!(e, DomainError::Upstream { .. } | DomainError::Store { .. }) {
                    breaker.record_failure();
                    warn!("Call to {} failed: {}", dependency, e);
                } else {
                    breaker.record_success();
                }
                Err(e)
            }
            Err(_) => {
                breaker.record_failure();
                warn!(
                    "Call to {} timed out after {}ms",
                    dependency,
                    timeout.as_millis()
                );
                Err(DomainError::upstream(
                    dependency,
                    format!("Timed out after {}ms", timeout.as_millis()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings(threshold: u32) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: threshold,
            cooldown: Duration::from_millis(40),
            max_backoff_exponent: 2,
            call_timeout: Duration::from_millis(50),
        }
    }

    fn registry() -> BreakerRegistry {
        let mut per_dependency = HashMap::new();
        per_dependency.insert("github".to_string(), fast_settings(2));
        BreakerRegistry::new(fast_settings(3), per_dependency)
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let registry = registry();

        let result = registry
            .call("npm", || async { Ok::<_, DomainError>(42) })
            .await
            .unwrap();

        assert_eq!(result.completed(), Some(42));
        assert_eq!(registry.state("npm"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_per_dependency_threshold() {
        let registry = registry();

        // github is configured with threshold 2
        for _ in 0..2 {
            let _ = registry
                .call("github", || async {
                    Err::<(), _>(DomainError::upstream("github", "boom"))
                })
                .await;
        }

        assert_eq!(registry.state("github"), Some(CircuitState::Open));

        let rejected = registry
            .call("github", || async { Ok::<_, DomainError>(()) })
            .await
            .unwrap();
        assert!(matches!(rejected, GuardedCall::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let registry = BreakerRegistry::new(fast_settings(1), HashMap::new());

        let result = registry
            .call("slow", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, DomainError>(())
            })
            .await;

        assert!(matches!(result, Err(DomainError::Upstream { .. })));
        assert_eq!(registry.state("slow"), Some(CircuitState::Open));
    }

    #[tokio::test]
    async fn test_five_timeouts_trip_pypi_and_short_circuit() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let mut per_dependency = HashMap::new();
        per_dependency.insert(
            "pypi".to_string(),
            BreakerSettings {
                failure_threshold: 5,
                cooldown: Duration::from_secs(60),
                max_backoff_exponent: 4,
                call_timeout: Duration::from_millis(10),
            },
        );
        let registry = BreakerRegistry::new(fast_settings(1), per_dependency);

        for _ in 0..5 {
            let result = registry
                .call("pypi", || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, DomainError>(())
                })
                .await;
            assert!(matches!(result, Err(DomainError::Upstream { .. })));
        }

        assert_eq!(registry.state("pypi"), Some(CircuitState::Open));

        // While open, calls are rejected without reaching the dependency
        let attempted = Arc::new(AtomicBool::new(false));
        let flag = attempted.clone();
        let rejected = registry
            .call("pypi", move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, DomainError>(())
            })
            .await
            .unwrap();

        assert!(matches!(rejected, GuardedCall::Rejected { .. }));
        assert!(!attempted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_recovery_after_cooldown() {
        let registry = BreakerRegistry::new(fast_settings(1), HashMap::new());

        let _ = registry
            .call("pypi", || async {
                Err::<(), _>(DomainError::upstream("pypi", "boom"))
            })
            .await;
        assert_eq!(registry.state("pypi"), Some(CircuitState::Open));

        tokio::time::sleep(Duration::from_millis(50)).await;

        // Half-open trial succeeds and closes the circuit
        let result = registry
            .call("pypi", || async { Ok::<_, DomainError>("ok") })
            .await
            .unwrap();
        assert_eq!(result.completed(), Some("ok"));
        assert_eq!(registry.state("pypi"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_breakers_are_independent() {
        let registry = BreakerRegistry::new(fast_settings(1), HashMap::new());

        let _ = registry
            .call("pypi", || async {
                Err::<(), _>(DomainError::upstream("pypi", "boom"))
            })
            .await;

        assert_eq!(registry.state("pypi"), Some(CircuitState::Open));

        let ok = registry
            .call("npm", || async { Ok::<_, DomainError>(()) })
            .await
            .unwrap();
        assert!(ok.completed().is_some());
    }

    #[tokio::test]
    async fn test_snapshot() {
        let registry = registry();
        let _ = registry
            .call("npm", || async { Ok::<_, DomainError>(()) })
            .await;

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.get("npm"), Some(&CircuitState::Closed));
        assert!(!snapshot.contains_key("github"));
    }
}
