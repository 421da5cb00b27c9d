//! Application services for the codewave execution core.

pub mod execution_service;
pub mod metrics_registry;
pub mod pricing;
pub mod prompt;
pub mod retry_orchestrator;
pub mod wave_executor;

pub use execution_service::ExecutionService;
pub use metrics_registry::{HistogramSummary, InMemoryMetricsSink};
pub use retry_orchestrator::{RetryOrchestrator, COST_BUDGET_EXHAUSTED};
pub use wave_executor::{apply_generated_code, WaveExecutor};
