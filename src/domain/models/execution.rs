//! Execution state, per-atom and per-wave results, and derived metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

use super::attempt::RetryResult;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Run is constructed but the drive task has not started yet.
    Pending,
    /// The drive task is consuming waves.
    Running,
    /// Paused at a wave boundary; remaining waves are retained.
    Paused,
    /// All waves drained with zero failed atoms. Terminal.
    Completed,
    /// All waves drained with failures, or the drive task faulted. Terminal.
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a status from its wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Statuses reachable from this one.
    pub fn valid_transitions(&self) -> &'static [ExecutionStatus] {
        match self {
            Self::Pending => &[Self::Running],
            Self::Running => &[Self::Paused, Self::Completed, Self::Failed],
            Self::Paused => &[Self::Running],
            // Terminal states never change.
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The authoritative per-run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Run identifier.
    pub id: Uuid,
    /// Owning masterplan identifier (used as a metric label only).
    pub masterplan_id: Uuid,
    pub status: ExecutionStatus,
    /// Index of the next wave to run (equals `total_waves` once drained).
    pub current_wave: usize,
    pub total_waves: usize,
    pub atoms_completed: usize,
    pub atoms_total: usize,
    pub atoms_succeeded: usize,
    pub atoms_failed: usize,
    /// Cumulative estimated cost in USD across all attempts.
    pub total_cost_usd: f64,
    /// Cumulative wall-clock time spent executing waves, in seconds.
    pub total_time_seconds: f64,
    /// Error recorded when the drive task faulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionState {
    pub fn new(id: Uuid, masterplan_id: Uuid, total_waves: usize, atoms_total: usize) -> Self {
        Self {
            id,
            masterplan_id,
            status: ExecutionStatus::Pending,
            current_wave: 0,
            total_waves,
            atoms_completed: 0,
            atoms_total,
            atoms_succeeded: 0,
            atoms_failed: 0,
            total_cost_usd: 0.0,
            total_time_seconds: 0.0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition to a new status, enforcing the state machine.
    pub fn transition_to(&mut self, next: ExecutionStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        match next {
            ExecutionStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(Utc::now());
            }
            ExecutionStatus::Completed | ExecutionStatus::Failed => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }

    /// Fold one wave's counts into the run totals.
    pub fn absorb_wave(&mut self, wave: &WaveResult) {
        self.atoms_succeeded += wave.succeeded;
        self.atoms_failed += wave.failed;
        self.atoms_completed = self.atoms_succeeded + self.atoms_failed;
        self.current_wave = wave.wave_index + 1;
        self.total_time_seconds += wave.duration_secs;
        self.total_cost_usd += wave
            .results
            .iter()
            .map(|r| r.retry.cost_usd)
            .sum::<f64>();
    }

    /// Fraction of atoms with a result, as a percentage.
    pub fn completion_percent(&self) -> f64 {
        if self.atoms_total == 0 {
            return 0.0;
        }
        self.atoms_completed as f64 / self.atoms_total as f64 * 100.0
    }

    /// Fraction of atoms that succeeded, as a percentage.
    pub fn precision_percent(&self) -> f64 {
        if self.atoms_total == 0 {
            return 0.0;
        }
        self.atoms_succeeded as f64 / self.atoms_total as f64 * 100.0
    }

    /// Point-in-time progress view.
    pub fn progress(&self) -> ExecutionProgress {
        ExecutionProgress {
            execution_id: self.id,
            status: self.status,
            completion_percent: self.completion_percent(),
            precision_percent: self.precision_percent(),
            current_wave: self.current_wave,
            total_waves: self.total_waves,
            atoms_completed: self.atoms_completed,
            atoms_total: self.atoms_total,
            atoms_succeeded: self.atoms_succeeded,
            atoms_failed: self.atoms_failed,
        }
    }
}

/// Result of one atom's execution, wrapping its retry result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub wave_index: usize,
    pub atom_id: String,
    pub retry: RetryResult,
    /// Wall-clock time for this atom, in seconds.
    pub duration_secs: f64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.retry.success
    }
}

/// Aggregated result of one wave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveResult {
    pub wave_index: usize,
    pub results: Vec<ExecutionResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_secs: f64,
    pub avg_attempts: f64,
}

impl WaveResult {
    /// A result for a wave with no atoms.
    pub fn empty(wave_index: usize) -> Self {
        Self {
            wave_index,
            results: Vec::new(),
            succeeded: 0,
            failed: 0,
            duration_secs: 0.0,
            avg_attempts: 0.0,
        }
    }

    /// Aggregate per-atom results into a wave result.
    pub fn from_results(wave_index: usize, results: Vec<ExecutionResult>, duration_secs: f64) -> Self {
        let succeeded = results.iter().filter(|r| r.success()).count();
        let failed = results.len() - succeeded;
        let avg_attempts = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| f64::from(r.retry.attempts)).sum::<f64>() / results.len() as f64
        };
        Self {
            wave_index,
            results,
            succeeded,
            failed,
            duration_secs,
            avg_attempts,
        }
    }

    /// Atoms completed per second; zero for an instantaneous wave.
    pub fn throughput(&self) -> f64 {
        if self.duration_secs <= f64::EPSILON {
            return 0.0;
        }
        self.results.len() as f64 / self.duration_secs
    }
}

/// Progress snapshot returned by the progress query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionProgress {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub completion_percent: f64,
    pub precision_percent: f64,
    pub current_wave: usize,
    pub total_waves: usize,
    pub atoms_completed: usize,
    pub atoms_total: usize,
    pub atoms_succeeded: usize,
    pub atoms_failed: usize,
}

/// Per-wave slice of the aggregated run metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveMetrics {
    pub wave_index: usize,
    pub atoms: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_secs: f64,
    pub avg_attempts: f64,
    pub throughput_atoms_per_sec: f64,
}

/// Aggregated metrics for one run, derived from state and wave results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub execution_id: Uuid,
    pub masterplan_id: Uuid,
    pub status: ExecutionStatus,
    pub completion_percent: f64,
    pub precision_percent: f64,
    pub attempts_total: u64,
    pub avg_attempts_per_atom: f64,
    pub total_cost_usd: f64,
    pub total_time_seconds: f64,
    pub waves: Vec<WaveMetrics>,
}

impl RunMetrics {
    /// Derive run metrics from the state and its wave results.
    pub fn derive(state: &ExecutionState, waves: &[WaveResult]) -> Self {
        let attempts_total: u64 = waves
            .iter()
            .flat_map(|w| w.results.iter())
            .map(|r| u64::from(r.retry.attempts))
            .sum();
        let avg_attempts_per_atom = if state.atoms_completed == 0 {
            0.0
        } else {
            attempts_total as f64 / state.atoms_completed as f64
        };
        Self {
            execution_id: state.id,
            masterplan_id: state.masterplan_id,
            status: state.status,
            completion_percent: state.completion_percent(),
            precision_percent: state.precision_percent(),
            attempts_total,
            avg_attempts_per_atom,
            total_cost_usd: state.total_cost_usd,
            total_time_seconds: state.total_time_seconds,
            waves: waves
                .iter()
                .map(|w| WaveMetrics {
                    wave_index: w.wave_index,
                    atoms: w.results.len(),
                    succeeded: w.succeeded,
                    failed: w.failed,
                    duration_secs: w.duration_secs,
                    avg_attempts: w.avg_attempts,
                    throughput_atoms_per_sec: w.throughput(),
                })
                .collect(),
        }
    }
}
