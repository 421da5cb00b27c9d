//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty stdout formatting
//! - Optional daily-rolling file output

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;

/// Initialized logging pipeline.
///
/// Holds the non-blocking file writer guard; dropping it flushes and
/// stops the background writer, so keep it alive for the process
/// lifetime.
pub struct Logging {
    _guard: Option<WorkerGuard>,
}

impl Logging {
    /// Initialize the global subscriber from configuration.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let env_filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();

        let guard = if let Some(ref log_dir) = config.log_dir {
            let file_appender = rolling::daily(log_dir, "codewave.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            // File output is always JSON for downstream processing.
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter);

            let stdout_filter = EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy();
            let stdout_layer = stdout_layer(&config.format, stdout_filter);

            tracing_subscriber::registry()
                .with(file_layer)
                .with(stdout_layer)
                .init();
            Some(guard)
        } else {
            let stdout_layer = stdout_layer(&config.format, env_filter);
            tracing_subscriber::registry().with(stdout_layer).init();
            None
        };

        Ok(Self { _guard: guard })
    }
}

fn stdout_layer<S>(
    format: &str,
    filter: EnvFilter,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if format == "json" {
        Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_filter(filter),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_filter(filter),
        )
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(anyhow!("Unknown log level: {other}")),
    }
}
