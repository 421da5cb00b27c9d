//! Enforcing cost guard with a fixed USD budget.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::{CostDecision, CostGuard};

/// Cost guard that denies attempts once spend plus the estimate would
/// exceed the budget.
#[derive(Debug)]
pub struct BudgetCostGuard {
    max_usd: f64,
    spent_usd: RwLock<f64>,
}

impl BudgetCostGuard {
    pub fn new(max_usd: f64) -> Self {
        Self {
            max_usd,
            spent_usd: RwLock::new(0.0),
        }
    }

    /// USD recorded so far.
    pub async fn spent_usd(&self) -> f64 {
        *self.spent_usd.read().await
    }

    /// Budget remaining, clamped at zero.
    pub async fn remaining_usd(&self) -> f64 {
        (self.max_usd - self.spent_usd().await).max(0.0)
    }
}

#[async_trait]
impl CostGuard for BudgetCostGuard {
    async fn admit(&self, estimated_cost_usd: f64) -> CostDecision {
        let spent = *self.spent_usd.read().await;
        if spent + estimated_cost_usd > self.max_usd {
            CostDecision::Denied {
                reason: format!(
                    "estimated ${estimated_cost_usd:.4} would exceed budget ${:.4} (spent ${spent:.4})",
                    self.max_usd
                ),
            }
        } else {
            CostDecision::Allowed
        }
    }

    async fn record(&self, actual_cost_usd: f64) {
        let mut spent = self.spent_usd.write().await;
        *spent += actual_cost_usd;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_budget_admits_within_budget() {
        let guard = BudgetCostGuard::new(1.0);
        assert_eq!(guard.admit(0.5).await, CostDecision::Allowed);
    }

    #[tokio::test]
    async fn test_budget_denies_when_exceeded() {
        let guard = BudgetCostGuard::new(1.0);
        guard.record(0.9).await;

        let decision = guard.admit(0.2).await;
        assert!(decision.is_denied());
        assert!((guard.remaining_usd().await - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_remaining_clamps_at_zero() {
        let guard = BudgetCostGuard::new(0.5);
        guard.record(0.8).await;
        assert_eq!(guard.remaining_usd().await, 0.0);
    }
}
