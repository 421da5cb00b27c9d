//! Wave executor: bounded-parallelism execution of atoms within a wave,
//! and wave-by-wave execution of a whole plan.
//!
//! A counting semaphore is the sole concurrency limiter. Atoms within a
//! wave are isolated: one atom's failure (or panic) never cancels its
//! siblings. Waves are strictly sequential; generated code is written
//! back into the atom map between waves so dependents can see it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::domain::models::{
    Atom, ExecutionPlan, ExecutorConfig, ExecutionResult, RetryResult, WaveResult,
};
use crate::domain::ports::metrics::names;
use crate::domain::ports::MetricsSink;
use crate::services::retry_orchestrator::RetryOrchestrator;

/// Executes waves of atoms under a concurrency cap.
pub struct WaveExecutor {
    orchestrator: Arc<RetryOrchestrator>,
    metrics: Arc<dyn MetricsSink>,
    config: ExecutorConfig,
}

impl WaveExecutor {
    pub fn new(
        orchestrator: Arc<RetryOrchestrator>,
        metrics: Arc<dyn MetricsSink>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            orchestrator,
            metrics,
            config,
        }
    }

    /// Execute one wave's atoms in parallel.
    ///
    /// Dependencies are resolved from `atoms_by_id`; identifiers missing
    /// from the map are silently skipped (externally satisfied or trimmed
    /// dependencies, not errors).
    pub async fn execute_wave(
        &self,
        masterplan_id: Uuid,
        wave_index: usize,
        wave_atoms: Vec<Atom>,
        atoms_by_id: &HashMap<String, Atom>,
    ) -> WaveResult {
        if wave_atoms.is_empty() {
            return WaveResult::empty(wave_index);
        }

        let start = Instant::now();
        let atom_count = wave_atoms.len();
        tracing::info!(wave_index, atoms = atom_count, "wave started");

        // At least one permit even if misconfigured to zero.
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(atom_count);
        let mut results = Vec::with_capacity(atom_count);

        for atom in wave_atoms {
            let dependencies: Vec<Atom> = atom
                .depends_on
                .iter()
                .filter_map(|dep_id| atoms_by_id.get(dep_id).cloned())
                .collect();

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(closed) => {
                    results.push(failed_result(wave_index, atom.id, closed.to_string()));
                    continue;
                }
            };

            let orchestrator = self.orchestrator.clone();
            let atom_id = atom.id.clone();
            let join = tokio::spawn(async move {
                let _permit = permit;
                let atom_start = Instant::now();
                let retry = orchestrator
                    .execute_with_retry(&atom, &dependencies, masterplan_id)
                    .await;
                ExecutionResult {
                    wave_index,
                    atom_id: atom.id,
                    retry,
                    duration_secs: atom_start.elapsed().as_secs_f64(),
                }
            });
            handles.push((atom_id, join));
        }

        for (atom_id, join) in handles {
            match join.await {
                Ok(result) => results.push(result),
                // A panicked or aborted atom becomes a failed result; the
                // rest of the wave is unaffected.
                Err(join_err) => {
                    tracing::error!(atom_id = %atom_id, error = %join_err, "atom task aborted");
                    results.push(failed_result(wave_index, atom_id, join_err.to_string()));
                }
            }
        }

        let wave_result = WaveResult::from_results(wave_index, results, start.elapsed().as_secs_f64());
        self.emit_wave_metrics(masterplan_id, &wave_result);
        tracing::info!(
            wave_index,
            succeeded = wave_result.succeeded,
            failed = wave_result.failed,
            duration_secs = wave_result.duration_secs,
            "wave completed"
        );
        wave_result
    }

    /// Execute a whole plan, wave by wave.
    ///
    /// Later waves start even when earlier waves had failures; atoms whose
    /// dependencies failed simply run without that context. Generated code
    /// is propagated into `atoms_by_id` between waves.
    pub async fn execute_plan(
        &self,
        masterplan_id: Uuid,
        plan: &ExecutionPlan,
        atoms_by_id: &mut HashMap<String, Atom>,
    ) -> Vec<WaveResult> {
        let mut wave_results = Vec::with_capacity(plan.waves.len());

        for wave in &plan.waves {
            let wave_atoms: Vec<Atom> = wave
                .atom_ids
                .iter()
                .filter_map(|id| atoms_by_id.get(id).cloned())
                .collect();

            let result = self
                .execute_wave(masterplan_id, wave.index, wave_atoms, atoms_by_id)
                .await;
            apply_generated_code(atoms_by_id, &result);
            wave_results.push(result);
        }

        wave_results
    }

    fn emit_wave_metrics(&self, masterplan_id: Uuid, wave: &WaveResult) {
        let wave_label = wave.wave_index.to_string();
        let masterplan_label = masterplan_id.to_string();

        self.metrics.incr_counter(
            names::ATOMS_SUCCEEDED_TOTAL,
            &[("wave_id", &wave_label), ("masterplan_id", &masterplan_label)],
            wave.succeeded as u64,
        );
        self.metrics.incr_counter(
            names::ATOMS_FAILED_TOTAL,
            &[("wave_id", &wave_label), ("masterplan_id", &masterplan_label)],
            wave.failed as u64,
        );
        self.metrics.set_gauge(
            names::WAVE_COMPLETION_PERCENT,
            &[("wave_id", &wave_label)],
            if wave.results.is_empty() {
                100.0
            } else {
                (wave.succeeded + wave.failed) as f64 / wave.results.len() as f64 * 100.0
            },
        );
        self.metrics.observe(
            names::WAVE_TIME_SECONDS,
            &[("wave_id", &wave_label)],
            wave.duration_secs,
        );
        self.metrics.observe(
            names::WAVE_ATOM_THROUGHPUT,
            &[("wave_id", &wave_label)],
            wave.throughput(),
        );
    }
}

/// Write successful generations back into the atom map so later waves
/// resolve dependency code.
pub fn apply_generated_code(atoms_by_id: &mut HashMap<String, Atom>, wave: &WaveResult) {
    for result in &wave.results {
        if result.retry.success {
            if let Some(atom) = atoms_by_id.get_mut(&result.atom_id) {
                atom.code = Some(result.retry.code.clone());
            }
        }
    }
}

fn failed_result(wave_index: usize, atom_id: String, message: String) -> ExecutionResult {
    ExecutionResult {
        wave_index,
        atom_id,
        retry: RetryResult::exhausted(String::new(), 1, vec![message.clone()], 0.0, message, 0.0),
        duration_secs: 0.0,
    }
}
