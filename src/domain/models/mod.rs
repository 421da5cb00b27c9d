//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod atom;
pub mod attempt;
pub mod config;
pub mod execution;
pub mod plan;

pub use atom::Atom;
pub use attempt::{
    AttemptOutcome, IssueSeverity, RetryResult, ValidationIssue, ValidationReport,
};
pub use config::{
    Config, CostGuardConfig, ExecutorConfig, LlmConfig, LoggingConfig, MetricsConfig,
    RetryConfig, ServerConfig,
};
pub use execution::{
    ExecutionProgress, ExecutionResult, ExecutionState, ExecutionStatus, RunMetrics,
    WaveMetrics, WaveResult,
};
pub use plan::{ExecutionPlan, PlanError, Wave};
