//! Anthropic Messages API client implementation of the LLM port.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use std::time::Duration;

use crate::domain::models::LlmConfig;
use crate::domain::ports::{LlmClient, LlmError};

use super::error::ProviderError;
use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;
use super::types::{Message, MessageRequest, MessageResponse};

/// HTTP client for the Anthropic Messages API.
///
/// Connection pooling via a shared `reqwest::Client`, token-bucket rate
/// limiting, and exponential-backoff retries for transient errors. The
/// request timeout bounds each provider call; the orchestrator above
/// never waits longer than one timed-out call per attempt.
pub struct AnthropicClient {
    http_client: ReqwestClient,
    api_key: String,
    base_url: String,
    model: String,
    timeout_secs: u64,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
}

impl AnthropicClient {
    /// Build a client from configuration and an API key.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, ProviderError> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(|err| ProviderError::NetworkError(err.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            rate_limiter: TokenBucketRateLimiter::new(config.rate_limit_rps),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
        })
    }

    async fn send_request(&self, request: &MessageRequest) -> Result<MessageResponse, ProviderError> {
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error response".to_string());
            return Err(ProviderError::from_status(status, body));
        }

        response
            .json::<MessageResponse>()
            .await
            .map_err(|err| ProviderError::NetworkError(err.to_string()))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.rate_limiter.acquire().await;

        let request = MessageRequest {
            model: self.model.clone(),
            max_tokens,
            temperature,
            messages: vec![Message::user(prompt)],
        };

        let response = self
            .retry_policy
            .execute(|| self.send_request(&request))
            .await
            .map_err(|err| match err {
                ProviderError::RateLimitExceeded => LlmError::RateLimited,
                ProviderError::NetworkError(message) if message.contains("timed out") => {
                    LlmError::Timeout(self.timeout_secs)
                }
                other => LlmError::Provider(other.to_string()),
            })?;

        let text = response.text();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}
