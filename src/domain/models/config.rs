use serde::{Deserialize, Serialize};

/// Main configuration structure for codewave.
///
/// Passed explicitly into the executor and orchestrator at construction;
/// never read from ambient module-level state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Control API server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Wave executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Retry orchestrator configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Cost guard configuration
    #[serde(default)]
    pub cost_guard: CostGuardConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
        }
    }
}

/// Wave executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorConfig {
    /// Maximum concurrent atoms per wave (must be at least 1)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Retry orchestrator configuration.
///
/// The attempt budget and temperature schedule are calibration contracts:
/// consumers tune precision targets against them, so changing either is a
/// breaking change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Attempts per atom
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt sampling temperatures; length must equal `max_attempts`
    #[serde(default = "default_temperature_schedule")]
    pub temperature_schedule: Vec<f64>,

    /// Maximum dependency code excerpts rendered into the prompt
    #[serde(default = "default_max_dependency_context")]
    pub max_dependency_context: usize,

    /// Token budget for each generation call
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            temperature_schedule: default_temperature_schedule(),
            max_dependency_context: default_max_dependency_context(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl RetryConfig {
    /// Temperature for a 1-indexed attempt. Attempts beyond the schedule
    /// reuse the final entry.
    pub fn temperature_for(&self, attempt: u32) -> f64 {
        let idx = attempt.saturating_sub(1) as usize;
        self.temperature_schedule
            .get(idx)
            .or_else(|| self.temperature_schedule.last())
            .copied()
            .unwrap_or(0.0)
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sustained request rate in requests per second
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: f64,

    /// Transport-level retries for transient provider errors
    #[serde(default = "default_transport_retries")]
    pub max_retries: u32,

    /// Initial transport backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum transport backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            rate_limit_rps: default_rate_limit_rps(),
            max_retries: default_transport_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Cost guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CostGuardConfig {
    /// When false the guard meters costs without enforcing them
    #[serde(default)]
    pub enabled: bool,

    /// Budget in USD per run; attempts are denied once exceeded
    #[serde(default)]
    pub max_run_cost_usd: Option<f64>,
}

impl Default for CostGuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_run_cost_usd: None,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsConfig {
    /// Whether to emit metrics to the sink
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for daily-rolling file output
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    9400
}

const fn default_true() -> bool {
    true
}

const fn default_max_concurrency() -> usize {
    100
}

const fn default_max_attempts() -> u32 {
    4
}

fn default_temperature_schedule() -> Vec<f64> {
    vec![0.7, 0.5, 0.3, 0.3]
}

const fn default_max_dependency_context() -> usize {
    3
}

const fn default_max_output_tokens() -> u32 {
    8192
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_rate_limit_rps() -> f64 {
    10.0
}

const fn default_transport_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}
