//! Retry orchestrator: drives one atom to validator-passing code or
//! exhaustion of its attempt budget.
//!
//! Each attempt is one LLM call plus one validator call. The temperature
//! schedule cools across attempts (exploration first, determinism last)
//! and validation errors from earlier attempts are fed back into the next
//! prompt. The orchestrator never errors to its caller: every failure
//! mode becomes a `success = false` result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::domain::models::{
    Atom, AttemptOutcome, IssueSeverity, RetryConfig, RetryResult, ValidationIssue,
};
use crate::domain::ports::metrics::names;
use crate::domain::ports::{CodeValidator, CostGuard, LlmClient, MetricsSink};
use crate::services::pricing;
use crate::services::prompt::{build_prompt, extract_code};

/// Error recorded when the cost guard denies an attempt. A denial ends
/// the atom's retry loop: later attempts would be denied too.
pub const COST_BUDGET_EXHAUSTED: &str = "cost budget exhausted";

/// Error recorded when extraction yields nothing.
const EMPTY_GENERATION: &str = "empty generation";

/// Drives a single atom through its bounded attempt loop.
///
/// Stateless across calls apart from lifetime success/pass tallies
/// feeding the rate gauges; each invocation is self-contained.
pub struct RetryOrchestrator {
    llm: Arc<dyn LlmClient>,
    validator: Arc<dyn CodeValidator>,
    cost_guard: Option<Arc<dyn CostGuard>>,
    metrics: Arc<dyn MetricsSink>,
    config: RetryConfig,
    model: String,
    atoms_attempted: AtomicU64,
    atoms_succeeded: AtomicU64,
    validations_run: AtomicU64,
    validations_passed: AtomicU64,
}

impl RetryOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        validator: Arc<dyn CodeValidator>,
        cost_guard: Option<Arc<dyn CostGuard>>,
        metrics: Arc<dyn MetricsSink>,
        config: RetryConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            validator,
            cost_guard,
            metrics,
            config,
            model: model.into(),
            atoms_attempted: AtomicU64::new(0),
            atoms_succeeded: AtomicU64::new(0),
            validations_run: AtomicU64::new(0),
            validations_passed: AtomicU64::new(0),
        }
    }

    /// Execute one atom with retries.
    ///
    /// `dependency_atoms` carry the code produced by the atom's
    /// dependencies, in declared order; only the first
    /// `max_dependency_context` are rendered into the prompt.
    pub async fn execute_with_retry(
        &self,
        atom: &Atom,
        dependency_atoms: &[Atom],
        masterplan_id: Uuid,
    ) -> RetryResult {
        let start = Instant::now();
        let mut errors: Vec<String> = Vec::new();
        let mut last_code = String::new();
        let mut cost_usd = 0.0;
        let mut attempts_used = 0u32;
        let mut fatal: Option<String> = None;
        let mut previous_temperature: Option<f64> = None;

        for attempt in 1..=self.config.max_attempts {
            attempts_used = attempt;
            let temperature = self.config.temperature_for(attempt);
            if previous_temperature.is_some_and(|prev| (prev - temperature).abs() > f64::EPSILON) {
                self.metrics.incr_counter(names::RETRY_TEMPERATURE_CHANGES, &[], 1);
            }
            previous_temperature = Some(temperature);

            let attempt_label = attempt.to_string();
            self.metrics.incr_counter(
                names::RETRY_ATTEMPTS_TOTAL,
                &[("atom_id", &atom.id), ("attempt", &attempt_label)],
                1,
            );

            let prompt = build_prompt(
                atom,
                dependency_atoms,
                &errors,
                self.config.max_dependency_context,
            );

            if let Some(guard) = &self.cost_guard {
                let estimated =
                    pricing::estimate_attempt_cost(&self.model, &prompt, self.config.max_output_tokens);
                if guard.admit(estimated).await.is_denied() {
                    tracing::warn!(
                        atom_id = %atom.id,
                        masterplan_id = %masterplan_id,
                        attempt,
                        "attempt denied by cost guard"
                    );
                    errors.push(COST_BUDGET_EXHAUSTED.to_string());
                    fatal = Some(COST_BUDGET_EXHAUSTED.to_string());
                    break;
                }
            }

            match self
                .run_attempt(atom, &prompt, temperature, &mut cost_usd)
                .await
            {
                AttemptOutcome::Passed { code } => {
                    tracing::debug!(
                        atom_id = %atom.id,
                        masterplan_id = %masterplan_id,
                        attempt,
                        "atom generated and validated"
                    );
                    self.record_outcome(&atom.id, start, true);
                    return RetryResult::succeeded(
                        code,
                        attempt,
                        errors,
                        start.elapsed().as_secs_f64(),
                        cost_usd,
                    );
                }
                AttemptOutcome::Failed { code, issues } => {
                    tracing::debug!(
                        atom_id = %atom.id,
                        attempt,
                        issue_count = issues.len(),
                        "attempt failed validation"
                    );
                    last_code = code;
                    errors.extend(feedback_from(&issues));
                }
                AttemptOutcome::PortError { message } => {
                    tracing::warn!(atom_id = %atom.id, attempt, error = %message, "attempt failed at a port");
                    errors.push(message.clone());
                    fatal = Some(message);
                }
            }
        }

        self.record_outcome(&atom.id, start, false);
        let fatal = fatal.unwrap_or_else(|| {
            format!("validation failed after {attempts_used} attempts")
        });
        RetryResult::exhausted(
            last_code,
            attempts_used,
            errors,
            start.elapsed().as_secs_f64(),
            fatal,
            cost_usd,
        )
    }

    /// Run one attempt: generate, record cost, extract, validate.
    async fn run_attempt(
        &self,
        atom: &Atom,
        prompt: &str,
        temperature: f64,
        cost_acc: &mut f64,
    ) -> AttemptOutcome {
        let output = match self
            .llm
            .generate(prompt, temperature, self.config.max_output_tokens)
            .await
        {
            Ok(output) => output,
            Err(err) => {
                return AttemptOutcome::PortError {
                    message: err.to_string(),
                }
            }
        };

        let actual = pricing::actual_attempt_cost(&self.model, prompt, &output);
        if let Some(guard) = &self.cost_guard {
            guard.record(actual).await;
        }
        *cost_acc += actual;

        let code = extract_code(&output, &atom.language);
        if code.is_empty() {
            return AttemptOutcome::Failed {
                code,
                issues: vec![ValidationIssue::new(IssueSeverity::Error, EMPTY_GENERATION)],
            };
        }

        self.validations_run.fetch_add(1, Ordering::Relaxed);
        match self.validator.validate(&code, &atom.language).await {
            Ok(report) if report.passed => {
                self.validations_passed.fetch_add(1, Ordering::Relaxed);
                self.publish_pass_rate();
                AttemptOutcome::Passed { code }
            }
            Ok(report) => {
                self.publish_pass_rate();
                AttemptOutcome::Failed {
                    code,
                    issues: report.issues,
                }
            }
            Err(err) => AttemptOutcome::PortError {
                message: err.to_string(),
            },
        }
    }

    fn record_outcome(&self, atom_id: &str, start: Instant, success: bool) {
        let attempted = self.atoms_attempted.fetch_add(1, Ordering::Relaxed) + 1;
        let succeeded = if success {
            self.atoms_succeeded.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.atoms_succeeded.load(Ordering::Relaxed)
        };
        self.metrics.set_gauge(
            names::RETRY_SUCCESS_RATE,
            &[],
            succeeded as f64 / attempted as f64,
        );
        self.metrics.observe(
            names::ATOM_EXECUTION_TIME_SECONDS,
            &[("atom_id", atom_id)],
            start.elapsed().as_secs_f64(),
        );
    }

    fn publish_pass_rate(&self) {
        let run = self.validations_run.load(Ordering::Relaxed);
        if run > 0 {
            let passed = self.validations_passed.load(Ordering::Relaxed);
            self.metrics.set_gauge(
                names::ATOM_VALIDATION_PASS_RATE,
                &[],
                passed as f64 / run as f64,
            );
        }
    }
}

/// Only `critical` and `error` issues are fed back to the model;
/// warnings and infos are dropped.
fn feedback_from(issues: &[ValidationIssue]) -> Vec<String> {
    issues
        .iter()
        .filter(|issue| issue.severity.feeds_back())
        .map(|issue| format!("[{}] {}", issue.severity.as_str(), issue.message))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::models::ValidationReport;
    use crate::domain::ports::cost_guard::CostDecision;
    use crate::domain::ports::llm_client::LlmError;
    use crate::domain::ports::NoopMetricsSink;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        temperatures: Mutex<Vec<f64>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                temperatures: Mutex::new(Vec::new()),
            }
        }

        fn seen_temperatures(&self) -> Vec<f64> {
            self.temperatures.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate(
            &self,
            _prompt: &str,
            temperature: f64,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            self.temperatures.lock().unwrap().push(temperature);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::EmptyResponse);
            }
            responses.remove(0)
        }
    }

    struct ScriptedValidator {
        reports: Mutex<Vec<ValidationReport>>,
    }

    impl ScriptedValidator {
        fn new(reports: Vec<ValidationReport>) -> Self {
            Self {
                reports: Mutex::new(reports),
            }
        }
    }

    #[async_trait]
    impl CodeValidator for ScriptedValidator {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn validate(&self, _code: &str, _language: &str) -> DomainResult<ValidationReport> {
            let mut reports = self.reports.lock().unwrap();
            if reports.is_empty() {
                return Ok(ValidationReport::passing());
            }
            Ok(reports.remove(0))
        }
    }

    struct DenyingGuard;

    #[async_trait]
    impl CostGuard for DenyingGuard {
        async fn admit(&self, _estimated_cost_usd: f64) -> CostDecision {
            CostDecision::Denied {
                reason: "over budget".to_string(),
            }
        }

        async fn record(&self, _actual_cost_usd: f64) {}
    }

    fn orchestrator(
        llm: Arc<ScriptedLlm>,
        validator: Arc<ScriptedValidator>,
        cost_guard: Option<Arc<dyn CostGuard>>,
    ) -> RetryOrchestrator {
        RetryOrchestrator::new(
            llm,
            validator,
            cost_guard,
            Arc::new(NoopMetricsSink),
            RetryConfig::default(),
            "sonnet",
        )
    }

    fn failing_report(message: &str) -> ValidationReport {
        ValidationReport::failing(vec![ValidationIssue::new(IssueSeverity::Critical, message)])
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(
            "```python\ndef f():\n    return \"hi\"\n```".to_string()
        )]));
        let validator = Arc::new(ScriptedValidator::new(vec![]));
        let orch = orchestrator(llm.clone(), validator, None);

        let atom = Atom::new("a1", "return the string hi", "python");
        let result = orch.execute_with_retry(&atom, &[], Uuid::new_v4()).await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.code, "def f():\n    return \"hi\"");
        assert!(result.errors.is_empty());
        assert_eq!(llm.seen_temperatures(), vec![0.7]);
    }

    #[tokio::test]
    async fn test_retry_then_succeed_follows_temperature_schedule() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("```python\nbad\n```".to_string()),
            Ok("```python\nstill bad\n```".to_string()),
            Ok("```python\ngood\n```".to_string()),
        ]));
        let validator = Arc::new(ScriptedValidator::new(vec![
            failing_report("syntax error"),
            failing_report("syntax error"),
            ValidationReport::passing(),
        ]));
        let orch = orchestrator(llm.clone(), validator, None);

        let atom = Atom::new("a1", "spec", "python");
        let result = orch.execute_with_retry(&atom, &[], Uuid::new_v4()).await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(llm.seen_temperatures(), vec![0.7, 0.5, 0.3]);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_error_history_and_last_code() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("```python\nv1\n```".to_string()),
            Ok("```python\nv2\n```".to_string()),
            Ok("```python\nv3\n```".to_string()),
            Ok("```python\nv4\n```".to_string()),
        ]));
        let validator = Arc::new(ScriptedValidator::new(vec![
            failing_report("e1"),
            failing_report("e2"),
            failing_report("e3"),
            failing_report("e4"),
        ]));
        let orch = orchestrator(llm, validator, None);

        let atom = Atom::new("a1", "spec", "python");
        let result = orch.execute_with_retry(&atom, &[], Uuid::new_v4()).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 4);
        assert_eq!(result.errors.len(), 4);
        assert_eq!(result.code, "v4");
        assert!(result.fatal_error.is_some());
    }

    #[tokio::test]
    async fn test_llm_error_consumes_attempt_and_sets_fatal() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::Provider("boom".to_string())),
            Err(LlmError::Provider("boom".to_string())),
            Err(LlmError::Provider("boom".to_string())),
            Err(LlmError::Timeout(300)),
        ]));
        let validator = Arc::new(ScriptedValidator::new(vec![]));
        let orch = orchestrator(llm, validator, None);

        let atom = Atom::new("a1", "spec", "python");
        let result = orch.execute_with_retry(&atom, &[], Uuid::new_v4()).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 4);
        assert_eq!(result.errors.len(), 4);
        // The last exception becomes the fatal message.
        assert_eq!(result.fatal_error.as_deref(), Some("Request timed out after 300 seconds"));
    }

    #[tokio::test]
    async fn test_empty_generation_is_a_failed_attempt() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("```python\n```".to_string()),
            Ok("```python\nok\n```".to_string()),
        ]));
        let validator = Arc::new(ScriptedValidator::new(vec![ValidationReport::passing()]));
        let orch = orchestrator(llm, validator, None);

        let atom = Atom::new("a1", "spec", "python");
        let result = orch.execute_with_retry(&atom, &[], Uuid::new_v4()).await;

        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert!(result.errors[0].contains("empty generation"));
    }

    #[tokio::test]
    async fn test_cost_denial_ends_retry_loop() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("```python\nok\n```".to_string())]));
        let validator = Arc::new(ScriptedValidator::new(vec![]));
        let orch = orchestrator(llm.clone(), validator, Some(Arc::new(DenyingGuard)));

        let atom = Atom::new("a1", "spec", "python");
        let result = orch.execute_with_retry(&atom, &[], Uuid::new_v4()).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.fatal_error.as_deref(), Some(COST_BUDGET_EXHAUSTED));
        // The LLM was never called.
        assert!(llm.seen_temperatures().is_empty());
    }

    #[tokio::test]
    async fn test_warning_issues_are_not_fed_back() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("```python\nv1\n```".to_string()),
            Ok("```python\nv2\n```".to_string()),
        ]));
        let validator = Arc::new(ScriptedValidator::new(vec![
            ValidationReport::failing(vec![
                ValidationIssue::new(IssueSeverity::Warning, "nit"),
                ValidationIssue::new(IssueSeverity::Error, "real problem"),
            ]),
            ValidationReport::passing(),
        ]));
        let orch = orchestrator(llm, validator, None);

        let atom = Atom::new("a1", "spec", "python");
        let result = orch.execute_with_retry(&atom, &[], Uuid::new_v4()).await;

        assert!(result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("real problem"));
    }
}
