//! Codewave - wave-scheduled LLM code-generation orchestrator
//!
//! Turns a validated build plan (a DAG of atomic code-generation units,
//! pre-grouped into waves) into generated source by driving an LLM
//! through bounded, temperature-scheduled retry attempts:
//! - Retry orchestrator with error-feedback prompting
//! - Wave executor with semaphore-bounded parallelism and atom isolation
//! - Execution service with a per-run state machine and pause/resume
//! - HTTP control API with an asynchronous start protocol
//! - Injected ports for the LLM, validator, cost guard, and metrics

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Atom, Config, ExecutionPlan, ExecutionStatus, Wave};
pub use services::{ExecutionService, RetryOrchestrator, WaveExecutor};
