//! Resilience for collaborator calls: circuit breaker, token budgets and
//! bounded retry with backoff.
//!
//! All state here lives for one pipeline run. Nothing carries over between
//! documents.

mod budget;
mod circuit_breaker;
mod retry;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::RetryPolicy;
