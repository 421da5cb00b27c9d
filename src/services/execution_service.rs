//! Execution service: owns the per-run state machine, spawns and
//! supervises background drive tasks, and answers queries.
//!
//! Each run lives in an in-memory run index shared between the drive
//! task and the query path. Mutation goes through per-run locks; queries
//! take read snapshots. Pause is cooperative at wave boundaries: the
//! remaining plan and the evolving atom map are retained in run-scoped
//! storage while paused so resume continues deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Atom, ExecutionPlan, ExecutionProgress, ExecutionResult, ExecutionState, ExecutionStatus,
    RunMetrics, WaveResult,
};
use crate::domain::ports::metrics::names;
use crate::domain::ports::MetricsSink;
use crate::services::wave_executor::{apply_generated_code, WaveExecutor};

/// Remaining work for a run: the plan suffix still to execute and the
/// atom map carrying generated code from completed waves.
struct PendingWork {
    next_wave: usize,
    plan: ExecutionPlan,
    atoms_by_id: HashMap<String, Atom>,
}

/// Shared per-run record.
struct RunHandle {
    state: RwLock<ExecutionState>,
    /// Single-writer (pauser), single-reader (drive loop) signal.
    pause_requested: AtomicBool,
    wave_results: RwLock<Vec<WaveResult>>,
    atom_results: RwLock<HashMap<String, ExecutionResult>>,
    /// Retained work while paused; `None` while a drive task owns it.
    pending: Mutex<Option<PendingWork>>,
    /// The supervised drive task, for shutdown.
    drive: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the run index and the run lifecycle.
pub struct ExecutionService {
    executor: Arc<WaveExecutor>,
    metrics: Arc<dyn MetricsSink>,
    runs: RwLock<HashMap<Uuid, Arc<RunHandle>>>,
}

impl ExecutionService {
    pub fn new(executor: Arc<WaveExecutor>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            executor,
            metrics,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Start a run and return its id without waiting for completion.
    ///
    /// The plan is validated, run state is allocated in `pending`, and a
    /// background drive task is spawned. Callers poll the query
    /// operations to observe progress.
    pub async fn start_execution(
        &self,
        masterplan_id: Uuid,
        plan: ExecutionPlan,
        atoms_by_id: HashMap<String, Atom>,
    ) -> DomainResult<Uuid> {
        plan.validate(&atoms_by_id)
            .map_err(|err| DomainError::ValidationFailed(err.to_string()))?;

        let run_id = Uuid::new_v4();
        let state = ExecutionState::new(run_id, masterplan_id, plan.waves.len(), plan.atom_count());
        let handle = Arc::new(RunHandle {
            state: RwLock::new(state),
            pause_requested: AtomicBool::new(false),
            wave_results: RwLock::new(Vec::new()),
            atom_results: RwLock::new(HashMap::new()),
            pending: Mutex::new(None),
            drive: Mutex::new(None),
        });

        self.runs.write().await.insert(run_id, handle.clone());

        let work = PendingWork {
            next_wave: 0,
            plan,
            atoms_by_id,
        };
        self.spawn_drive(handle, work).await;

        tracing::info!(run_id = %run_id, masterplan_id = %masterplan_id, "execution started");
        Ok(run_id)
    }

    /// Snapshot of the run's authoritative state.
    pub async fn get_state(&self, run_id: Uuid) -> DomainResult<ExecutionState> {
        let handle = self.get_run(run_id).await?;
        let state = handle.state.read().await.clone();
        Ok(state)
    }

    /// All runs, optionally filtered by status, newest first.
    pub async fn list_executions(
        &self,
        status_filter: Option<ExecutionStatus>,
    ) -> Vec<ExecutionState> {
        let runs = self.runs.read().await;
        let mut states = Vec::with_capacity(runs.len());
        for handle in runs.values() {
            let state = handle.state.read().await.clone();
            if status_filter.is_none_or(|wanted| state.status == wanted) {
                states.push(state);
            }
        }
        states.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        states
    }

    /// Completion and precision view of one run.
    pub async fn get_progress(&self, run_id: Uuid) -> DomainResult<ExecutionProgress> {
        let handle = self.get_run(run_id).await?;
        let progress = handle.state.read().await.progress();
        Ok(progress)
    }

    /// Result of one completed wave.
    pub async fn get_wave_result(&self, run_id: Uuid, wave_index: usize) -> DomainResult<WaveResult> {
        let handle = self.get_run(run_id).await?;
        let waves = handle.wave_results.read().await;
        waves
            .iter()
            .find(|wave| wave.wave_index == wave_index)
            .cloned()
            .ok_or(DomainError::WaveNotFound {
                execution_id: run_id,
                wave_index,
            })
    }

    /// Result of one completed atom.
    pub async fn get_atom_result(&self, run_id: Uuid, atom_id: &str) -> DomainResult<ExecutionResult> {
        let handle = self.get_run(run_id).await?;
        let atoms = handle.atom_results.read().await;
        atoms
            .get(atom_id)
            .cloned()
            .ok_or_else(|| DomainError::AtomNotFound {
                execution_id: run_id,
                atom_id: atom_id.to_string(),
            })
    }

    /// Aggregated counters and derived precision for one run.
    pub async fn get_metrics(&self, run_id: Uuid) -> DomainResult<RunMetrics> {
        let handle = self.get_run(run_id).await?;
        let state = handle.state.read().await.clone();
        let waves = handle.wave_results.read().await;
        Ok(RunMetrics::derive(&state, &waves))
    }

    /// Request a cooperative pause at the next wave boundary.
    ///
    /// In-flight atoms finish normally; the status flips to `paused` only
    /// when the drive loop reaches the boundary.
    pub async fn pause(&self, run_id: Uuid) -> DomainResult<ExecutionState> {
        let handle = self.get_run(run_id).await?;
        let state = handle.state.read().await;
        if state.status != ExecutionStatus::Running {
            return Err(DomainError::InvalidStateTransition {
                from: state.status.as_str().to_string(),
                to: ExecutionStatus::Paused.as_str().to_string(),
            });
        }
        handle.pause_requested.store(true, Ordering::SeqCst);
        tracing::info!(run_id = %run_id, "pause requested");
        Ok(state.clone())
    }

    /// Resume a paused run from the wave after the last completed one.
    pub async fn resume(&self, run_id: Uuid) -> DomainResult<ExecutionState> {
        let handle = self.get_run(run_id).await?;

        // Lock order (pending, then state) matches the drive loop's
        // pause path; taking them in the opposite order can deadlock.
        let work = {
            let mut pending = handle.pending.lock().await;
            let mut state = handle.state.write().await;
            state.transition_to(ExecutionStatus::Running)?;
            match pending.take() {
                Some(work) => work,
                None => {
                    return Err(DomainError::Internal(format!(
                        "run {run_id} is paused but has no retained work"
                    )))
                }
            }
        };

        handle.pause_requested.store(false, Ordering::SeqCst);
        let snapshot = handle.state.read().await.clone();
        self.spawn_drive(handle, work).await;
        tracing::info!(run_id = %run_id, "execution resumed");
        Ok(snapshot)
    }

    /// Number of runs that are not yet terminal.
    pub async fn active_run_count(&self) -> usize {
        let runs = self.runs.read().await;
        let mut active = 0;
        for handle in runs.values() {
            if !handle.state.read().await.status.is_terminal() {
                active += 1;
            }
        }
        active
    }

    /// Request pause on every run and wait for their drive tasks to park.
    ///
    /// Paused runs keep their retained work, so a later process could
    /// resume them if persistence is added in front of this service.
    pub async fn shutdown(&self) {
        let handles: Vec<Arc<RunHandle>> = self.runs.read().await.values().cloned().collect();
        for handle in &handles {
            handle.pause_requested.store(true, Ordering::SeqCst);
        }

        let mut joins = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(join) = handle.drive.lock().await.take() {
                joins.push(join);
            }
        }
        for result in futures::future::join_all(joins).await {
            if let Err(err) = result {
                tracing::error!(error = %err, "drive task aborted during shutdown");
            }
        }
        tracing::info!("execution service drained");
    }

    async fn get_run(&self, run_id: Uuid) -> DomainResult<Arc<RunHandle>> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or(DomainError::ExecutionNotFound(run_id))
    }

    async fn spawn_drive(&self, handle: Arc<RunHandle>, work: PendingWork) {
        let executor = self.executor.clone();
        let metrics = self.metrics.clone();
        let drive_handle = handle.clone();
        let join = tokio::spawn(async move {
            drive_run(executor, metrics, drive_handle, work).await;
        });
        *handle.drive.lock().await = Some(join);
    }
}

/// Background drive: consume waves until drained, paused, or faulted.
async fn drive_run(
    executor: Arc<WaveExecutor>,
    metrics: Arc<dyn MetricsSink>,
    handle: Arc<RunHandle>,
    work: PendingWork,
) {
    {
        let mut state = handle.state.write().await;
        if state.status == ExecutionStatus::Pending {
            if let Err(err) = state.transition_to(ExecutionStatus::Running) {
                tracing::error!(error = %err, "run could not start");
                return;
            }
        }
    }

    if let Err(err) = drive_waves(&executor, &metrics, &handle, work).await {
        let mut state = handle.state.write().await;
        state.error = Some(err.to_string());
        if !state.status.is_terminal() {
            let _ = state.transition_to(ExecutionStatus::Failed);
        }
        tracing::error!(run_id = %state.id, error = %err, "execution failed in drive loop");
    }
}

async fn drive_waves(
    executor: &WaveExecutor,
    metrics: &Arc<dyn MetricsSink>,
    handle: &Arc<RunHandle>,
    mut work: PendingWork,
) -> DomainResult<()> {
    let (run_id, masterplan_id) = {
        let state = handle.state.read().await;
        (state.id, state.masterplan_id)
    };

    while work.next_wave < work.plan.waves.len() {
        if handle.pause_requested.swap(false, Ordering::SeqCst) {
            let mut pending = handle.pending.lock().await;
            let mut state = handle.state.write().await;
            state.transition_to(ExecutionStatus::Paused)?;
            let next_wave = work.next_wave;
            *pending = Some(work);
            tracing::info!(run_id = %run_id, next_wave, "execution paused at wave boundary");
            return Ok(());
        }

        let wave = work.plan.waves[work.next_wave].clone();
        let wave_atoms: Vec<Atom> = wave
            .atom_ids
            .iter()
            .filter_map(|id| work.atoms_by_id.get(id).cloned())
            .collect();

        let result = executor
            .execute_wave(masterplan_id, wave.index, wave_atoms, &work.atoms_by_id)
            .await;
        apply_generated_code(&mut work.atoms_by_id, &result);

        // Publish atom and wave results before the state counters so a
        // query that sees the counts can also fetch the results.
        {
            let mut atom_results = handle.atom_results.write().await;
            for atom_result in &result.results {
                atom_results.insert(atom_result.atom_id.clone(), atom_result.clone());
            }
        }
        {
            let mut wave_results = handle.wave_results.write().await;
            wave_results.push(result.clone());
        }
        {
            let mut state = handle.state.write().await;
            state.absorb_wave(&result);
        }

        work.next_wave += 1;
    }

    let mut state = handle.state.write().await;
    let final_status = if state.atoms_failed == 0 {
        ExecutionStatus::Completed
    } else {
        ExecutionStatus::Failed
    };
    state.transition_to(final_status)?;

    let masterplan_label = state.masterplan_id.to_string();
    metrics.set_gauge(
        names::EXECUTION_PRECISION_PERCENT,
        &[("masterplan_id", &masterplan_label)],
        state.precision_percent(),
    );
    metrics.set_gauge(
        names::EXECUTION_COST_USD_TOTAL,
        &[("masterplan_id", &masterplan_label)],
        state.total_cost_usd,
    );
    metrics.observe(
        names::EXECUTION_TIME_SECONDS,
        &[("masterplan_id", &masterplan_label)],
        state.total_time_seconds,
    );

    tracing::info!(
        run_id = %state.id,
        status = state.status.as_str(),
        succeeded = state.atoms_succeeded,
        failed = state.atoms_failed,
        "execution finished"
    );
    Ok(())
}
