//! Circuit Breaker
//!
//! Per-provider breaker: opens after a run of consecutive transient failures,
//! refuses calls for the cool-down window, then lets a single trial through.
//! Every admitted call holds a `CallPermit`; a permit dropped without an
//! outcome (the caller's future was cancelled) releases a half-open trial by
//! reopening the circuit.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{HawalaError, HawalaResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub cool_down_secs: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down_secs: 30,
        }
    }
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum CircuitState {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    cool_down: Duration,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            cool_down,
            state: Mutex::new(CircuitState::Closed { failures: 0 }),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitConfig) -> Self {
        Self::new(name, config.failure_threshold, Duration::from_secs(config.cool_down_secs))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> std::sync::MutexGuard<'_, CircuitState> {
        // A poisoned breaker still holds a valid state
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> CircuitStatus {
        match *self.state() {
            CircuitState::Closed { .. } => CircuitStatus::Closed,
            CircuitState::Open { .. } => CircuitStatus::Open,
            CircuitState::HalfOpen { .. } => CircuitStatus::HalfOpen,
        }
    }

    /// Ask permission for a call; refused while open or while a trial runs
    pub fn before_call(&self) -> HawalaResult<CallPermit<'_>> {
        let mut state = self.state();
        match *state {
            CircuitState::Closed { .. } => {}
            CircuitState::Open { since } => {
                if since.elapsed() < self.cool_down {
                    return Err(HawalaError::circuit_open(format!(
                        "Provider {} is cooling down",
                        self.name
                    )));
                }
                *state = CircuitState::HalfOpen { trial_in_flight: true };
                crate::log_info!("circuit", "Cool-down elapsed, allowing trial call", provider = self.name);
            }
            CircuitState::HalfOpen { trial_in_flight: true } => {
                return Err(HawalaError::circuit_open(format!(
                    "Provider {} has a trial call in flight",
                    self.name
                )));
            }
            CircuitState::HalfOpen { trial_in_flight: false } => {
                *state = CircuitState::HalfOpen { trial_in_flight: true };
            }
        }
        Ok(CallPermit {
            breaker: self,
            settled: false,
        })
    }

    pub fn record_success(&self) {
        let mut state = self.state();
        if !matches!(*state, CircuitState::Closed { .. }) {
            crate::log_info!("circuit", "Provider recovered, closing circuit", provider = self.name);
        }
        *state = CircuitState::Closed { failures: 0 };
    }

    /// Count a transient failure
    pub fn record_failure(&self) {
        let mut state = self.state();
        let next = match *state {
            CircuitState::Closed { failures } if failures + 1 < self.failure_threshold => {
                CircuitState::Closed { failures: failures + 1 }
            }
            CircuitState::Closed { .. } | CircuitState::HalfOpen { .. } => {
                crate::log_warn!(
                    "circuit",
                    "Opening circuit",
                    provider = self.name,
                    cool_down_secs = self.cool_down.as_secs(),
                );
                CircuitState::Open { since: Instant::now() }
            }
            CircuitState::Open { since } => CircuitState::Open { since },
        };
        *state = next;
    }

    /// A call was admitted but never reported back
    fn abandon(&self) {
        let mut state = self.state();
        if let CircuitState::HalfOpen { .. } = *state {
            crate::log_warn!("circuit", "Trial call abandoned, reopening circuit", provider = self.name);
            *state = CircuitState::Open { since: Instant::now() };
        }
    }
}

/// Admission for one call through a `CircuitBreaker`
#[must_use = "report the outcome with `succeeded` or `failed`"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    /// Report a transient failure
    pub fn failed(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn open_breaker(cool_down: Duration) -> CircuitBreaker {
        let breaker = CircuitBreaker::new("p", 1, cool_down);
        breaker.before_call().unwrap().failed();
        breaker
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new("p", 3, Duration::from_secs(60));
        breaker.before_call().unwrap().failed();
        breaker.before_call().unwrap().failed();
        assert_eq!(breaker.status(), CircuitStatus::Closed);
        breaker.before_call().unwrap().failed();
        assert_eq!(breaker.status(), CircuitStatus::Open);
        assert_eq!(breaker.before_call().unwrap_err().code, ErrorCode::CircuitOpen);
    }

    #[test]
    fn test_success_resets_failure_run() {
        let breaker = CircuitBreaker::new("p", 2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.status(), CircuitStatus::Closed);
    }

    #[test]
    fn test_half_open_allows_one_trial() {
        let breaker = open_breaker(Duration::from_millis(10));
        assert!(breaker.before_call().is_err());
        std::thread::sleep(Duration::from_millis(20));

        let trial = breaker.before_call().unwrap();
        assert_eq!(breaker.status(), CircuitStatus::HalfOpen);
        assert!(breaker.before_call().is_err());

        trial.succeeded();
        assert_eq!(breaker.status(), CircuitStatus::Closed);
        assert!(breaker.before_call().is_ok());
    }

    #[test]
    fn test_failed_trial_reopens() {
        let breaker = open_breaker(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        breaker.before_call().unwrap().failed();
        assert_eq!(breaker.status(), CircuitStatus::Open);
        assert!(breaker.before_call().is_err());
    }

    #[test]
    fn test_dropped_trial_releases_circuit() {
        let breaker = open_breaker(Duration::ZERO);
        let trial = breaker.before_call().unwrap();
        assert_eq!(breaker.status(), CircuitStatus::HalfOpen);
        drop(trial);

        assert_eq!(breaker.status(), CircuitStatus::Open);
        // Cool-down of zero: the next caller gets a fresh trial
        breaker.before_call().unwrap().succeeded();
        assert_eq!(breaker.status(), CircuitStatus::Closed);
    }

    #[test]
    fn test_dropped_call_while_closed_is_not_a_failure() {
        let breaker = CircuitBreaker::new("p", 1, Duration::from_secs(60));
        drop(breaker.before_call().unwrap());
        assert_eq!(breaker.status(), CircuitStatus::Closed);
    }
}
