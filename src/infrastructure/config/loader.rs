use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrency: {0}. Must be at least 1")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Temperature schedule has {schedule_len} entries but max_attempts is {max_attempts}; they must match"
    )]
    ScheduleLengthMismatch {
        schedule_len: usize,
        max_attempts: u32,
    },

    #[error("Invalid temperature: {0}. Must be within [0.0, 2.0]")]
    InvalidTemperature(f64),

    #[error("Invalid max_output_tokens: {0}. Cannot be 0")]
    InvalidMaxOutputTokens(u32),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Cost guard enabled but max_run_cost_usd is missing or non-positive")]
    InvalidCostBudget,

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .codewave/config.yaml (project config)
    /// 3. .codewave/local.yaml (project local overrides, optional)
    /// 4. Environment variables (CODEWAVE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".codewave/config.yaml"))
            .merge(Yaml::file(".codewave/local.yaml"))
            .merge(Env::prefixed("CODEWAVE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.executor.max_concurrency == 0 {
            return Err(ConfigError::InvalidMaxConcurrency(
                config.executor.max_concurrency,
            ));
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }

        // The schedule is calibrated per attempt; a mismatch silently
        // reuses the last entry, so reject it up front instead.
        if config.retry.temperature_schedule.len() != config.retry.max_attempts as usize {
            return Err(ConfigError::ScheduleLengthMismatch {
                schedule_len: config.retry.temperature_schedule.len(),
                max_attempts: config.retry.max_attempts,
            });
        }

        for &temperature in &config.retry.temperature_schedule {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidTemperature(temperature));
            }
        }

        if config.retry.max_output_tokens == 0 {
            return Err(ConfigError::InvalidMaxOutputTokens(
                config.retry.max_output_tokens,
            ));
        }

        if config.llm.rate_limit_rps <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(config.llm.rate_limit_rps));
        }

        if config.llm.initial_backoff_ms >= config.llm.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.llm.initial_backoff_ms,
                config.llm.max_backoff_ms,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.cost_guard.enabled
            && !config
                .cost_guard
                .max_run_cost_usd
                .is_some_and(|budget| budget > 0.0)
        {
            return Err(ConfigError::InvalidCostBudget);
        }

        Ok(())
    }
}
