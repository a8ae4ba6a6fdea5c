//! Circuit breaker state machine
//!
//! Closed -> Open after `failure_threshold` consecutive failures;
//! Open -> HalfOpen once the cooldown elapses; HalfOpen admits exactly one
//! trial call, going back to Closed on success or to Open on failure. The
//! cooldown doubles on repeated trips up to a cap. Each breaker guards a
//! single dependency; breakers share nothing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dependency breaker tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Base time the circuit stays open before admitting a trial
    pub cooldown: Duration,
    /// Cap on the backoff doubling: cooldown * 2^min(trips-1, cap)
    pub max_backoff_exponent: u32,
    /// Upper bound on a single guarded call; a timeout counts as a failure
    pub call_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            max_backoff_exponent: 4,
            call_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Times the circuit has opened since the last full recovery
    trips: u32,
    opened_at: Option<Instant>,
    /// Whether the single HalfOpen trial is currently out
    trial_in_flight: bool,
}

/// Circuit breaker for a single dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                trips: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current state, accounting for an elapsed cooldown (Open reads as
    /// HalfOpen once a trial would be admitted). Does not reserve the trial.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Open if self.cooldown_elapsed(&inner) => CircuitState::HalfOpen,
            other => other,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .lock()
            .expect("breaker lock poisoned")
            .consecutive_failures
    }

    /// Try to admit a call. `Err` carries the wait until the next trial
    /// would be admitted.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                if self.cooldown_elapsed(&inner) {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(())
                } else {
                    Err(self.remaining_cooldown(&inner))
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // One probe at a time; everyone else keeps waiting
                    Err(self.current_cooldown(&inner))
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures = 0;
        inner.trial_in_flight = false;
        if inner.state != CircuitState::Closed {
            inner.state = CircuitState::Closed;
            inner.trips = 0;
            inner.opened_at = None;
        }
    }

    /// Record a failed call (timeouts included)
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.trial_in_flight = false;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    Self::trip(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures += 1;
                Self::trip(&mut inner);
            }
            CircuitState::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    /// Wait until the breaker would next admit a call, if it is not Closed
    pub fn retry_after(&self) -> Option<Duration> {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => None,
            CircuitState::Open => Some(self.remaining_cooldown(&inner)),
            CircuitState::HalfOpen => Some(Duration::ZERO),
        }
    }

    fn trip(inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.trips += 1;
        inner.opened_at = Some(Instant::now());
    }

    fn current_cooldown(&self, inner: &BreakerInner) -> Duration {
        let exponent = inner
            .trips
            .saturating_sub(1)
            .min(self.settings.max_backoff_exponent);
        self.settings
            .cooldown
            .saturating_mul(2u32.saturating_pow(exponent))
    }

    fn cooldown_elapsed(&self, inner: &BreakerInner) -> bool {
        match inner.opened_at {
            Some(at) => at.elapsed() >= self.current_cooldown(inner),
            None => true,
        }
    }

    fn remaining_cooldown(&self, inner: &BreakerInner) -> Duration {
        match inner.opened_at {
            Some(at) => self.current_cooldown(inner).saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }
}
