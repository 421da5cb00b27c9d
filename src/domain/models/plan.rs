//! Execution plan domain models.
//!
//! A plan is a sequence of waves covering every atom exactly once, where
//! each atom's dependencies are satisfied by strictly earlier waves (or
//! by atoms outside the plan entirely).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::atom::Atom;

/// An ordered collection of atoms whose dependencies are fully satisfied
/// by atoms in strictly earlier waves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    /// Zero-based wave index, monotonically increasing across the plan.
    pub index: usize,
    /// Identifiers of the atoms in this wave.
    pub atom_ids: Vec<String>,
}

/// A sequence of waves covering every atom exactly once.
///
/// Produced by the planning collaborator; consumed but never mutated by
/// the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub waves: Vec<Wave>,
}

impl ExecutionPlan {
    /// Total number of atoms across all waves.
    pub fn atom_count(&self) -> usize {
        self.waves.iter().map(|w| w.atom_ids.len()).sum()
    }

    /// Validate the plan against the atom map.
    ///
    /// Checks that wave indices run `0..n` in order, that every atom id
    /// appears in exactly one wave and resolves in `atoms_by_id`, and
    /// that every dependency either resolves to a strictly earlier wave
    /// or is absent from the map (externally satisfied).
    pub fn validate(&self, atoms_by_id: &HashMap<String, Atom>) -> Result<(), PlanError> {
        let mut wave_of: HashMap<&str, usize> = HashMap::new();

        for (position, wave) in self.waves.iter().enumerate() {
            if wave.index != position {
                return Err(PlanError::NonContiguousWaveIndex {
                    expected: position,
                    found: wave.index,
                });
            }
            for atom_id in &wave.atom_ids {
                if !atoms_by_id.contains_key(atom_id) {
                    return Err(PlanError::UnknownAtom(atom_id.clone()));
                }
                if wave_of.insert(atom_id.as_str(), wave.index).is_some() {
                    return Err(PlanError::DuplicateAtom(atom_id.clone()));
                }
            }
        }

        for wave in &self.waves {
            for atom_id in &wave.atom_ids {
                let atom = &atoms_by_id[atom_id];
                for dep in &atom.depends_on {
                    match wave_of.get(dep.as_str()) {
                        // Dependencies outside the map are externally satisfied.
                        None if !atoms_by_id.contains_key(dep) => {}
                        Some(&dep_wave) if dep_wave < wave.index => {}
                        _ => {
                            return Err(PlanError::DependencyNotEarlier {
                                atom_id: atom_id.clone(),
                                dependency: dep.clone(),
                                wave_index: wave.index,
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Plan structure errors.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("Wave indices must be contiguous from 0: expected {expected}, found {found}")]
    NonContiguousWaveIndex { expected: usize, found: usize },

    #[error("Atom appears in more than one wave: {0}")]
    DuplicateAtom(String),

    #[error("Atom referenced by plan but missing from atom map: {0}")]
    UnknownAtom(String),

    #[error("Atom {atom_id} in wave {wave_index} depends on {dependency}, which is not in an earlier wave")]
    DependencyNotEarlier {
        atom_id: String,
        dependency: String,
        wave_index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atoms(entries: &[(&str, &[&str])]) -> HashMap<String, Atom> {
        entries
            .iter()
            .map(|(id, deps)| {
                let atom = Atom::new(*id, "spec", "python")
                    .with_dependencies(deps.iter().map(|d| (*d).to_string()).collect());
                ((*id).to_string(), atom)
            })
            .collect()
    }

    fn plan(waves: &[&[&str]]) -> ExecutionPlan {
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

    #[test]
    fn test_valid_plan() {
        let atoms = atoms(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"])]);
        let plan = plan(&[&["a"], &["b"], &["c"]]);
        assert!(plan.validate(&atoms).is_ok());
        assert_eq!(plan.atom_count(), 3);
    }

    #[test]
    fn test_empty_plan_is_valid() {
        let plan = ExecutionPlan::default();
        assert!(plan.validate(&HashMap::new()).is_ok());
        assert_eq!(plan.atom_count(), 0);
    }

    #[test]
    fn test_same_wave_dependency_rejected() {
        let atoms = atoms(&[("a", &[]), ("b", &["a"])]);
        let plan = plan(&[&["a", "b"]]);
        let err = plan.validate(&atoms).unwrap_err();
        assert!(matches!(err, PlanError::DependencyNotEarlier { .. }));
    }

    #[test]
    fn test_external_dependency_allowed() {
        // "lib.util" is not in the atom map: it was satisfied in a
        // previous run or trimmed by the planner.
        let atoms = atoms(&[("a", &["lib.util"])]);
        let plan = plan(&[&["a"]]);
        assert!(plan.validate(&atoms).is_ok());
    }

    #[test]
    fn test_duplicate_atom_rejected() {
        let atoms = atoms(&[("a", &[])]);
        let plan = plan(&[&["a"], &["a"]]);
        assert!(matches!(
            plan.validate(&atoms).unwrap_err(),
            PlanError::DuplicateAtom(_)
        ));
    }

    #[test]
    fn test_unknown_atom_rejected() {
        let plan = plan(&[&["ghost"]]);
        assert!(matches!(
            plan.validate(&HashMap::new()).unwrap_err(),
            PlanError::UnknownAtom(_)
        ));
    }

    #[test]
    fn test_non_contiguous_wave_index_rejected() {
        let atoms = atoms(&[("a", &[])]);
        let mut p = plan(&[&["a"]]);
        p.waves[0].index = 3;
        assert!(matches!(
            p.validate(&atoms).unwrap_err(),
            PlanError::NonContiguousWaveIndex { .. }
        ));
    }
}
