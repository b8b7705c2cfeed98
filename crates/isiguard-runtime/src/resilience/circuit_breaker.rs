//! Circuit breaker per collaborator.
//!
//! After repeated failures the circuit opens and further calls to that
//! collaborator are skipped in favor of the deterministic fallback.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::duration_str;
use crate::pipeline::Collaborator;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before a recovery attempt
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls bypass the collaborator
    Open { opened_at: Instant },

    /// Probing whether the collaborator recovered
    HalfOpen { successes: u32 },
}

/// Independent circuits, one per collaborator.
pub struct CircuitBreaker {
    states: RwLock<HashMap<Collaborator, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `collaborator` should be skipped.
    ///
    /// An open circuit past its recovery timeout moves to half-open and
    /// lets the call through.
    pub fn is_open(&self, collaborator: Collaborator) -> bool {
        let states = self.states.read();
        match states.get(&collaborator) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(collaborator);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        match states.get(&collaborator).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(collaborator, CircuitState::Closed { failures: 0 });
                    tracing::info!(collaborator = %collaborator, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        collaborator,
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(collaborator, CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        let failures = match states.get(&collaborator).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    collaborator,
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(collaborator = %collaborator, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                collaborator,
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(
                collaborator = %collaborator,
                failures,
                "Circuit opened after repeated failures"
            );
        } else {
            states.insert(collaborator, CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        if matches!(states.get(&collaborator), Some(CircuitState::Open { .. })) {
            states.insert(collaborator, CircuitState::HalfOpen { successes: 0 });
            tracing::info!(collaborator = %collaborator, "Circuit half-open, probing collaborator");
        }
    }

    pub fn state(&self, collaborator: Collaborator) -> CircuitState {
        self.states
            .read()
            .get(&collaborator)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open(Collaborator::Extraction));
        assert_eq!(cb.state(Collaborator::Extraction), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_circuit_opens_after_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });

        cb.record_failure(Collaborator::Extraction);
        assert!(!cb.is_open(Collaborator::Extraction));

        cb.record_failure(Collaborator::Extraction);
        assert!(cb.is_open(Collaborator::Extraction));
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();

        cb.record_failure(Collaborator::Reasoning);
        cb.record_failure(Collaborator::Reasoning);
        cb.record_success(Collaborator::Reasoning);

        cb.record_failure(Collaborator::Reasoning);
        cb.record_failure(Collaborator::Reasoning);
        assert!(!cb.is_open(Collaborator::Reasoning));
    }

    #[test]
    fn test_collaborators_are_independent() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });

        cb.record_failure(Collaborator::Extraction);
        assert!(cb.is_open(Collaborator::Extraction));
        assert!(!cb.is_open(Collaborator::Reasoning));
        assert!(!cb.is_open(Collaborator::Layout));
    }

    #[test]
    fn test_recovery_through_half_open() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 2,
        });

        cb.record_failure(Collaborator::Extraction);
        assert!(!cb.is_open(Collaborator::Extraction));
        assert_eq!(cb.state(Collaborator::Extraction), CircuitState::HalfOpen { successes: 0 });

        cb.record_success(Collaborator::Extraction);
        cb.record_success(Collaborator::Extraction);
        assert_eq!(cb.state(Collaborator::Extraction), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_failure_while_half_open_reopens() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 2,
        });

        cb.record_failure(Collaborator::Reasoning);
        assert!(!cb.is_open(Collaborator::Reasoning));
        cb.record_failure(Collaborator::Reasoning);
        assert!(matches!(cb.state(Collaborator::Reasoning), CircuitState::Open { .. }));
    }
}
