//! Cost guard port.

use async_trait::async_trait;

/// Decision returned by [`CostGuard::admit`].
#[derive(Debug, Clone, PartialEq)]
pub enum CostDecision {
    Allowed,
    Denied { reason: String },
}

impl CostDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

/// Trait for attempt-level cost admission and accounting.
///
/// `admit` is consulted before each attempt with an estimated cost;
/// `record` is called after each attempt with the observed cost. A
/// metering implementation admits everything and only accumulates.
#[async_trait]
pub trait CostGuard: Send + Sync {
    /// Decide whether an attempt with the given estimated cost may run.
    async fn admit(&self, estimated_cost_usd: f64) -> CostDecision;

    /// Record the actual cost of a finished attempt.
    async fn record(&self, actual_cost_usd: f64);
}
