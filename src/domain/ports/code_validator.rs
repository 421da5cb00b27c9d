//! Code validator port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ValidationReport;

/// Trait for code validation backends.
///
/// A validator judges one piece of generated code in one language and
/// reports a binary verdict plus severity-tagged issues. Implementations
/// must be purely functional: same code and language, same report.
#[async_trait]
pub trait CodeValidator: Send + Sync {
    /// Validator name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Validate generated code for the given language tag.
    async fn validate(&self, code: &str, language: &str) -> DomainResult<ValidationReport>;
}
