//! Property tests for structural invariants: plan/wave ordering, count
//! arithmetic, and the status state machine.

use std::collections::HashMap;

use codewave::domain::models::{
    Atom, ExecutionPlan, ExecutionResult, ExecutionState, ExecutionStatus, RetryConfig,
    RetryResult, Wave, WaveResult,
};
use proptest::prelude::*;
use uuid::Uuid;

/// Build a layered plan: `layer_sizes[i]` atoms in wave `i`, each atom
/// depending on a subset of the previous wave chosen by `dep_seed`.
fn layered_plan(layer_sizes: &[usize], dep_seed: u64) -> (ExecutionPlan, HashMap<String, Atom>) {
    let mut waves = Vec::new();
    let mut atoms = HashMap::new();
    let mut previous: Vec<String> = Vec::new();

    for (wave_index, &size) in layer_sizes.iter().enumerate() {
        let mut ids = Vec::new();
        for n in 0..size {
            let id = format!("w{wave_index}n{n}");
            let deps: Vec<String> = previous
                .iter()
                .enumerate()
                .filter(|(i, _)| (dep_seed >> ((wave_index + i + n) % 60)) & 1 == 1)
                .map(|(_, d)| d.clone())
                .collect();
            atoms.insert(
                id.clone(),
                Atom::new(&id, "spec", "python").with_dependencies(deps),
            );
            ids.push(id);
        }
        waves.push(Wave {
            index: wave_index,
            atom_ids: ids.clone(),
        });
        previous = ids;
    }

    (ExecutionPlan { waves }, atoms)
}

fn retry_result(success: bool, attempts: u32) -> RetryResult {
    if success {
        RetryResult::succeeded("code".into(), attempts, vec![], 0.01, 0.001)
    } else {
        RetryResult::exhausted("".into(), attempts, vec!["e".into()], 0.01, "e".into(), 0.001)
    }
}

proptest! {
    /// Plans whose dependencies always point at the previous wave are valid.
    #[test]
    fn prop_layered_plans_validate(
        layer_sizes in prop::collection::vec(1usize..5, 1..5),
        dep_seed in any::<u64>(),
    ) {
        let (plan, atoms) = layered_plan(&layer_sizes, dep_seed);
        prop_assert!(plan.validate(&atoms).is_ok());
        prop_assert_eq!(plan.atom_count(), layer_sizes.iter().sum::<usize>());
    }

    /// Moving any dependency into its dependent's own wave breaks validation.
    #[test]
    fn prop_same_wave_dependency_is_rejected(
        layer_sizes in prop::collection::vec(2usize..5, 2..4),
    ) {
        let (plan, mut atoms) = layered_plan(&layer_sizes, 0);
        // Make the second atom of wave 0 depend on the first.
        let first = plan.waves[0].atom_ids[0].clone();
        let second = plan.waves[0].atom_ids[1].clone();
        if let Some(atom) = atoms.get_mut(&second) {
            atom.depends_on.push(first);
        }
        prop_assert!(plan.validate(&atoms).is_err());
    }

    /// Wave aggregation preserves count arithmetic.
    #[test]
    fn prop_wave_counts_add_up(
        outcomes in prop::collection::vec((any::<bool>(), 1u32..=4), 0..40),
    ) {
        let results: Vec<ExecutionResult> = outcomes
            .iter()
            .enumerate()
            .map(|(i, (success, attempts))| ExecutionResult {
                wave_index: 0,
                atom_id: format!("a{i}"),
                retry: retry_result(*success, *attempts),
                duration_secs: 0.01,
            })
            .collect();

        let wave = WaveResult::from_results(0, results, 0.5);
        prop_assert_eq!(wave.succeeded + wave.failed, wave.results.len());
        if !wave.results.is_empty() {
            prop_assert!(wave.avg_attempts >= 1.0);
            prop_assert!(wave.avg_attempts <= 4.0);
        }
    }

    /// Absorbing waves keeps the completion invariant and percent bounds.
    #[test]
    fn prop_state_counts_stay_consistent(
        outcomes in prop::collection::vec((any::<bool>(), 1u32..=4), 1..30),
        extra_capacity in 0usize..10,
    ) {
        let total = outcomes.len() + extra_capacity;
        let mut state = ExecutionState::new(Uuid::new_v4(), Uuid::new_v4(), 1, total);
        state.transition_to(ExecutionStatus::Running).unwrap();

        let results: Vec<ExecutionResult> = outcomes
            .iter()
            .enumerate()
            .map(|(i, (success, attempts))| ExecutionResult {
                wave_index: 0,
                atom_id: format!("a{i}"),
                retry: retry_result(*success, *attempts),
                duration_secs: 0.01,
            })
            .collect();
        state.absorb_wave(&WaveResult::from_results(0, results, 0.2));

        prop_assert_eq!(state.atoms_completed, state.atoms_succeeded + state.atoms_failed);
        prop_assert!(state.atoms_completed <= state.atoms_total);
        prop_assert!((0.0..=100.0).contains(&state.completion_percent()));
        prop_assert!((0.0..=100.0).contains(&state.precision_percent()));
        prop_assert!(state.precision_percent() <= state.completion_percent());
    }

    /// The temperature schedule is always honoured and never escapes its range.
    #[test]
    fn prop_temperature_follows_schedule(attempt in 1u32..20) {
        let config = RetryConfig::default();
        let temperature = config.temperature_for(attempt);
        prop_assert!((0.0..=1.0).contains(&temperature));
        if (attempt as usize) <= config.temperature_schedule.len() {
            prop_assert_eq!(temperature, config.temperature_schedule[(attempt - 1) as usize]);
        } else {
            prop_assert_eq!(temperature, *config.temperature_schedule.last().unwrap());
        }
    }

    /// Terminal statuses never transition anywhere.
    #[test]
    fn prop_terminal_states_are_closed(next in 0usize..5) {
        let statuses = [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
        ];
        for terminal in [ExecutionStatus::Completed, ExecutionStatus::Failed] {
            prop_assert!(!terminal.can_transition_to(statuses[next]));
        }
    }
}
