//! LLM client port - interface for text-generation backends.

use async_trait::async_trait;
use thiserror::Error;

/// Errors an LLM port implementation may surface.
///
/// Implementations are expected to retry transient provider errors and
/// enforce their own deadlines before failing; an error returned here
/// consumes one logical attempt in the retry orchestrator.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Trait for LLM generation backends.
///
/// The core never calls a network service directly; all generation goes
/// through this port.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Backend name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Generate text for a prompt at the given sampling temperature.
    async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}
