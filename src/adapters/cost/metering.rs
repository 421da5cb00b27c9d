//! Record-only cost guard.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::{CostDecision, CostGuard};

/// Cost guard that admits every attempt and accumulates recorded costs.
///
/// The default guard: cost tracking stays observable without ever
/// denying work.
#[derive(Debug, Default)]
pub struct MeteringCostGuard {
    total_usd: RwLock<f64>,
}

impl MeteringCostGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total USD recorded so far.
    pub async fn total_usd(&self) -> f64 {
        *self.total_usd.read().await
    }
}

#[async_trait]
impl CostGuard for MeteringCostGuard {
    async fn admit(&self, _estimated_cost_usd: f64) -> CostDecision {
        CostDecision::Allowed
    }

    async fn record(&self, actual_cost_usd: f64) {
        let mut total = self.total_usd.write().await;
        *total += actual_cost_usd;
    }
}
