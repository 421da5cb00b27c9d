//! Ports the execution core consumes.
//!
//! All external effects go through these injected interfaces: text
//! generation, code validation, cost admission, and metric emission.

pub mod code_validator;
pub mod cost_guard;
pub mod llm_client;
pub mod metrics;

pub use code_validator::CodeValidator;
pub use cost_guard::{CostDecision, CostGuard};
pub use llm_client::{LlmClient, LlmError};
pub use metrics::{Labels, MetricsSink, NoopMetricsSink};
