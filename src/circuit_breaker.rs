//! Per-service circuit breakers.
//!
//! ```text
//! Closed    → Open:      failure_count exceeds failure_threshold
//! Open      → HalfOpen:  first availability check after next_retry_at (lazy, no timer)
//! HalfOpen  → Closed:    any success
//! HalfOpen  → Open:      failure_count exceeds failure_threshold again
//! ```
//!
//! HalfOpen does not limit concurrent trial calls: every request that arrives
//! while half-open is let through and its outcome counted on its own.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use crate::config::BreakerConfig;
use crate::metrics::CIRCUIT_STATE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge_value(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    // only meaningful while Open
    next_retry_at: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            next_retry_at: None,
        }
    }
}

/// Breakers for every configured service.
///
/// The map itself is fixed at startup, only the per-service state behind each
/// mutex changes, so two services never contend on the same lock.
pub struct CircuitBreakers {
    breakers: HashMap<String, Mutex<BreakerState>>,
    config: BreakerConfig,
}

impl CircuitBreakers {
    pub fn new<'a>(services: impl IntoIterator<Item = &'a str>, config: BreakerConfig) -> Self {
        let breakers = services
            .into_iter()
            .map(|name| {
                CIRCUIT_STATE
                    .with_label_values(&[name])
                    .set(CircuitState::Closed.gauge_value());
                (name.to_string(), Mutex::new(BreakerState::new()))
            })
            .collect();

        Self { breakers, config }
    }

    pub fn contains(&self, service: &str) -> bool {
        self.breakers.contains_key(service)
    }

    pub fn state(&self, service: &str) -> Option<CircuitState> {
        self.lock(service).map(|b| b.state)
    }

    pub fn failure_count(&self, service: &str) -> Option<u32> {
        self.lock(service).map(|b| b.failure_count)
    }

    pub fn is_available(&self, service: &str) -> bool {
        self.is_available_at(service, Instant::now())
    }

    /// Whether a call to `service` may proceed at `now`.
    ///
    /// Performs the lazy Open → HalfOpen transition once the retry deadline has
    /// passed. Unknown services are never available.
    pub fn is_available_at(&self, service: &str, now: Instant) -> bool {
        let Some(mut breaker) = self.lock(service) else {
            return false;
        };

        match breaker.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let retry_due = breaker.next_retry_at.is_none_or(|at| now > at);
                if retry_due {
                    breaker.state = CircuitState::HalfOpen;
                    breaker.next_retry_at = None;
                    set_gauge(service, CircuitState::HalfOpen);
                    tracing::info!(service, "circuit half-open, allowing trial calls");
                }
                retry_due
            }
        }
    }

    pub fn record_outcome(&self, service: &str, success: bool) {
        self.record_outcome_at(service, success, Instant::now());
    }

    pub fn record_outcome_at(&self, service: &str, success: bool, now: Instant) {
        let Some(mut breaker) = self.lock(service) else {
            tracing::warn!(service, "outcome reported for unknown service");
            return;
        };

        match (breaker.state, success) {
            (CircuitState::Closed, true) => {
                // only consecutive failures count
                breaker.failure_count = 0;
            }
            (CircuitState::HalfOpen, true) => {
                breaker.state = CircuitState::Closed;
                breaker.failure_count = 0;
                set_gauge(service, CircuitState::Closed);
                tracing::info!(service, "circuit closed");
            }
            (CircuitState::Closed | CircuitState::HalfOpen, false) => {
                breaker.failure_count += 1;
                if breaker.failure_count > self.config.failure_threshold {
                    let from = breaker.state;
                    breaker.state = CircuitState::Open;
                    breaker.failure_count = 0;
                    breaker.next_retry_at = Some(now + self.config.reset_timeout);
                    set_gauge(service, CircuitState::Open);
                    tracing::warn!(
                        service,
                        ?from,
                        retry_in_ms = self.config.reset_timeout.as_millis() as u64,
                        "circuit opened"
                    );
                }
            }
            // calls that were already in flight when the circuit opened
            (CircuitState::Open, _) => {}
        }
    }

    fn lock(&self, service: &str) -> Option<MutexGuard<'_, BreakerState>> {
        self.breakers
            .get(service)
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn set_gauge(service: &str, state: CircuitState) {
    CIRCUIT_STATE
        .with_label_values(&[service])
        .set(state.gauge_value());
}
