//! Model-aware cost estimation.
//!
//! The LLM port returns text only, so attempt costs are estimated from
//! prompt and output sizes against a per-model pricing table. Admission
//! estimates assume the full output token budget; recorded costs use the
//! observed output length.

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Cost per million input tokens (USD).
    pub input: f64,
    /// Cost per million output tokens (USD).
    pub output: f64,
}

/// Known model pricing table (costs in USD per million tokens).
const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    ("claude-opus-4-6", ModelPricing { input: 15.0, output: 75.0 }),
    ("opus", ModelPricing { input: 15.0, output: 75.0 }),
    ("claude-sonnet-4-5", ModelPricing { input: 3.0, output: 15.0 }),
    ("sonnet", ModelPricing { input: 3.0, output: 15.0 }),
    ("claude-haiku-4-5", ModelPricing { input: 0.80, output: 4.0 }),
    ("haiku", ModelPricing { input: 0.80, output: 4.0 }),
];

/// Fallback for models missing from the table.
const DEFAULT_PRICING: ModelPricing = ModelPricing { input: 3.0, output: 15.0 };

/// Get pricing for a model by name or alias.
///
/// Matches against known model name substrings (e.g. "sonnet" matches
/// "claude-sonnet-4-5-20250916").
pub fn model_pricing(model: &str) -> ModelPricing {
    let model_lower = model.to_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| model_lower.contains(name))
        .map_or(DEFAULT_PRICING, |(_, pricing)| *pricing)
}

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Upper-bound cost of an attempt, assuming the full output budget is used.
pub fn estimate_attempt_cost(model: &str, prompt: &str, max_output_tokens: u32) -> f64 {
    let pricing = model_pricing(model);
    (estimate_tokens(prompt) as f64 * pricing.input
        + f64::from(max_output_tokens) * pricing.output)
        / 1_000_000.0
}

/// Observed cost of a finished attempt from prompt and response sizes.
pub fn actual_attempt_cost(model: &str, prompt: &str, response: &str) -> f64 {
    let pricing = model_pricing(model);
    (estimate_tokens(prompt) as f64 * pricing.input
        + estimate_tokens(response) as f64 * pricing.output)
        / 1_000_000.0
}
