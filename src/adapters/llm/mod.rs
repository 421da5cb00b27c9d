//! LLM port adapters: the Anthropic client and a scripted mock.

pub mod anthropic;
pub mod error;
pub mod mock;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use anthropic::AnthropicClient;
pub use error::ProviderError;
pub use mock::{MockLlmClient, MockReply};
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
