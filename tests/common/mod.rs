//! Common test utilities for integration tests
//!
//! Provides shared fixtures and port doubles used across the
//! integration test files.

// Each test binary compiles this module separately and uses a subset.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use codewave::domain::errors::DomainResult;
use codewave::domain::models::{
    Atom, ExecutionPlan, ExecutionStatus, ExecutorConfig, IssueSeverity, RetryConfig,
    ValidationIssue, ValidationReport, Wave,
};
use codewave::domain::ports::{CodeValidator, CostGuard, LlmClient, MetricsSink};
use codewave::services::{
    ExecutionService, InMemoryMetricsSink, RetryOrchestrator, WaveExecutor,
};

/// Validator double driven by a per-call script; once the script drains,
/// every call gets the default verdict.
pub struct ScriptedValidator {
    script: Mutex<VecDeque<ValidationReport>>,
    default_passes: bool,
}

impl ScriptedValidator {
    /// Passes everything (after any scripted reports).
    pub fn passing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_passes: true,
        }
    }

    /// Fails everything with one `error`-severity issue.
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_passes: false,
        }
    }

    pub fn push_report(&self, report: ValidationReport) {
        self.script.lock().unwrap().push_back(report);
    }
}

#[async_trait]
impl CodeValidator for ScriptedValidator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn validate(&self, _code: &str, _language: &str) -> DomainResult<ValidationReport> {
        if let Some(report) = self.script.lock().unwrap().pop_front() {
            return Ok(report);
        }
        if self.default_passes {
            Ok(ValidationReport::passing())
        } else {
            Ok(ValidationReport::failing(vec![ValidationIssue::new(
                IssueSeverity::Error,
                "scripted failure",
            )]))
        }
    }
}

/// A failing report with one issue of the given severity.
#[allow(dead_code)]
pub fn failing_report(severity: IssueSeverity, message: &str) -> ValidationReport {
    ValidationReport::failing(vec![ValidationIssue::new(severity, message)])
}

/// Build an atom in `language` python with the given dependencies.
pub fn atom(id: &str, deps: &[&str]) -> Atom {
    Atom::new(id, format!("implement unit {id}"), "python")
        .with_dependencies(deps.iter().map(|d| (*d).to_string()).collect())
}

/// Build a plan where wave `i` holds the ids of `waves[i]`.
pub fn plan_of(waves: &[&[&str]]) -> ExecutionPlan {
    ExecutionPlan {
        waves: waves
            .iter()
            .enumerate()
            .map(|(index, ids)| Wave {
                index,
                atom_ids: ids.iter().map(|s| (*s).to_string()).collect(),
            })
            .collect(),
    }
}

/// Atom map for a set of atoms.
pub fn atoms_map(atoms: Vec<Atom>) -> HashMap<String, Atom> {
    atoms.into_iter().map(|a| (a.id.clone(), a)).collect()
}

/// Wire an executor over the given ports with default retry settings.
pub fn build_executor(
    llm: Arc<dyn LlmClient>,
    validator: Arc<dyn CodeValidator>,
    cost_guard: Option<Arc<dyn CostGuard>>,
    metrics: Arc<InMemoryMetricsSink>,
    max_concurrency: usize,
) -> Arc<WaveExecutor> {
    let orchestrator = Arc::new(RetryOrchestrator::new(
        llm,
        validator,
        cost_guard,
        metrics.clone() as Arc<dyn MetricsSink>,
        RetryConfig::default(),
        "sonnet",
    ));
    Arc::new(WaveExecutor::new(
        orchestrator,
        metrics as Arc<dyn MetricsSink>,
        ExecutorConfig { max_concurrency },
    ))
}

/// Wire a full service over the given ports.
pub fn build_service(
    llm: Arc<dyn LlmClient>,
    validator: Arc<dyn CodeValidator>,
) -> (Arc<ExecutionService>, Arc<InMemoryMetricsSink>) {
    let metrics = Arc::new(InMemoryMetricsSink::new());
    let executor = build_executor(llm, validator, None, metrics.clone(), 100);
    let service = Arc::new(ExecutionService::new(
        executor,
        metrics.clone() as Arc<dyn MetricsSink>,
    ));
    (service, metrics)
}

/// Poll until the run reaches a terminal status or the timeout elapses.
pub async fn wait_for_terminal(
    service: &ExecutionService,
    run_id: uuid::Uuid,
    timeout_ms: u64,
) -> codewave::domain::models::ExecutionState {
    let deadline = std::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let state = service.get_state(run_id).await.expect("run exists");
        if state.status.is_terminal() {
            return state;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "run did not settle within {timeout_ms}ms (status: {})",
            state.status.as_str()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until the run reaches the given status or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_for_status(
    service: &ExecutionService,
    run_id: uuid::Uuid,
    wanted: ExecutionStatus,
    timeout_ms: u64,
) {
    let deadline = std::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let state = service.get_state(run_id).await.expect("run exists");
        if state.status == wanted {
            return;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "run never reached {} within {timeout_ms}ms (status: {})",
            wanted.as_str(),
            state.status.as_str()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
