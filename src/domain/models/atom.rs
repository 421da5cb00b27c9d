//! Atom domain model.

use serde::{Deserialize, Serialize};

/// The smallest self-contained unit of code generation: roughly one
/// function, class, or small module.
///
/// Atoms are produced by the atomization collaborator and are immutable
/// to the core, except for `code`, which the executor fills in once the
/// atom has been generated so that dependent atoms in later waves can
/// see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Stable identifier minted by the atomizer (e.g. `"auth.login.handler"`).
    pub id: String,
    /// Natural-language specification of what to generate.
    pub spec: String,
    /// Programming language tag (e.g. `"python"`, `"rust"`).
    pub language: String,
    /// Identifiers of atoms this atom depends on, in declared order.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Generated source code, present once the atom has executed successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Atom {
    /// Create an atom with no dependencies and no generated code.
    pub fn new(id: impl Into<String>, spec: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            spec: spec.into(),
            language: language.into(),
            depends_on: Vec::new(),
            code: None,
        }
    }

    /// Builder-style helper to attach dependencies.
    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }
}
