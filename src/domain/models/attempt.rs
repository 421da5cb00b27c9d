//! Attempt and retry result models.
//!
//! One attempt is a single LLM call plus a single validator call for an
//! atom. Attempt outcomes are modelled as a sum type consumed by the
//! retry loop; exceptions are reserved for contract violations.

use serde::{Deserialize, Serialize};

/// Severity of a validator issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Whether issues of this severity are fed back into the next attempt.
    pub fn feeds_back(&self) -> bool {
        matches!(self, Self::Critical | Self::Error)
    }
}

/// A single issue reported by the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Verdict of one validator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn passing() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
        }
    }

    pub fn failing(issues: Vec<ValidationIssue>) -> Self {
        Self {
            passed: false,
            issues,
        }
    }

    /// Messages of issues severe enough to feed back to the model.
    pub fn feedback_messages(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| i.severity.feeds_back())
            .map(|i| format!("[{}] {}", i.severity.as_str(), i.message))
            .collect()
    }
}

/// Outcome of one attempt, consumed by the retry loop.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The validator passed the extracted code.
    Passed { code: String },
    /// The validator rejected the extracted code.
    Failed {
        code: String,
        issues: Vec<ValidationIssue>,
    },
    /// The LLM or cost-guard port failed; the attempt is consumed.
    PortError { message: String },
}

/// Result of driving one atom through its full attempt budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryResult {
    /// Whether any attempt produced validator-passing code.
    pub success: bool,
    /// Generated code on success; the last attempt's failing code otherwise.
    pub code: String,
    /// Number of attempts consumed, 1-indexed (first passing attempt on success).
    pub attempts: u32,
    /// Accumulated error history across attempts.
    pub errors: Vec<String>,
    /// Wall-clock time across all attempts, in seconds.
    pub duration_secs: f64,
    /// Fatal error message when the budget was exhausted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    /// Estimated USD cost recorded across all attempts.
    pub cost_usd: f64,
}

impl RetryResult {
    pub fn succeeded(code: String, attempts: u32, errors: Vec<String>, duration_secs: f64, cost_usd: f64) -> Self {
        Self {
            success: true,
            code,
            attempts,
            errors,
            duration_secs,
            fatal_error: None,
            cost_usd,
        }
    }

    pub fn exhausted(
        last_code: String,
        attempts: u32,
        errors: Vec<String>,
        duration_secs: f64,
        fatal_error: String,
        cost_usd: f64,
    ) -> Self {
        Self {
            success: false,
            code: last_code,
            attempts,
            errors,
            duration_secs,
            fatal_error: Some(fatal_error),
            cost_usd,
        }
    }
}
