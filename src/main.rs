//! Codewave CLI entry point

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use codewave::adapters::cost::{BudgetCostGuard, MeteringCostGuard};
use codewave::adapters::http::ExecutionHttpServer;
use codewave::adapters::llm::{AnthropicClient, MockLlmClient};
use codewave::adapters::validators::StaticAnalysisValidator;
use codewave::domain::models::{Atom, Config, ExecutionPlan};
use codewave::domain::ports::{CodeValidator, CostGuard, LlmClient, MetricsSink, NoopMetricsSink};
use codewave::infrastructure::config::ConfigLoader;
use codewave::infrastructure::logging::Logging;
use codewave::services::{ExecutionService, InMemoryMetricsSink, RetryOrchestrator, WaveExecutor};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "codewave", version, about = "Wave-scheduled LLM code-generation orchestrator")]
struct Cli {
    /// Path to a config file (defaults to hierarchical .codewave/ loading)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the execution control API server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Execute a plan file end-to-end and print a per-wave summary
    Run {
        /// Plan file (JSON or YAML) with masterplan_id, plan, and atoms_by_id
        #[arg(long)]
        plan: PathBuf,

        /// Use the built-in mock LLM client instead of the provider
        #[arg(long)]
        mock: bool,
    },
}

/// On-disk plan document, matching the control API's start request.
#[derive(Debug, Deserialize)]
struct PlanDocument {
    masterplan_id: Uuid,
    plan: ExecutionPlan,
    atoms_by_id: HashMap<String, Atom>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };
    let _logging = Logging::init(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Commands::Run { plan, mock } => run_plan(config, &plan, mock).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let service = build_service(&config, false)?;
    let server = ExecutionHttpServer::new(service, config.server.clone());

    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .map_err(|err| anyhow::anyhow!("server error: {err}"))
}

async fn run_plan(config: Config, path: &PathBuf, mock: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file {}", path.display()))?;
    let document: PlanDocument = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&raw).context("Failed to parse YAML plan")?,
        _ => serde_json::from_str(&raw).context("Failed to parse JSON plan")?,
    };

    let service = build_service(&config, mock)?;
    let run_id = service
        .start_execution(document.masterplan_id, document.plan, document.atoms_by_id)
        .await?;

    // Poll until the run settles; the drive task owns the work.
    loop {
        let state = service.get_state(run_id).await?;
        if state.status.is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }

    let state = service.get_state(run_id).await?;
    let metrics = service.get_metrics(run_id).await?;
    println!(
        "run {} {}: {}/{} atoms succeeded ({:.1}% precision) in {:.1}s, ${:.4}",
        run_id,
        state.status.as_str(),
        state.atoms_succeeded,
        state.atoms_total,
        state.precision_percent(),
        state.total_time_seconds,
        state.total_cost_usd,
    );
    for wave in &metrics.waves {
        println!(
            "  wave {}: {}/{} succeeded, {:.1}s, {:.2} avg attempts",
            wave.wave_index,
            wave.succeeded,
            wave.atoms,
            wave.duration_secs,
            wave.avg_attempts,
        );
    }

    if state.atoms_failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn build_service(config: &Config, mock: bool) -> Result<Arc<ExecutionService>> {
    let metrics: Arc<dyn MetricsSink> = if config.metrics.enabled {
        Arc::new(InMemoryMetricsSink::new())
    } else {
        Arc::new(NoopMetricsSink)
    };

    let llm: Arc<dyn LlmClient> = if mock {
        Arc::new(MockLlmClient::new())
    } else {
        let api_key = std::env::var(&config.llm.api_key_env).with_context(|| {
            format!("environment variable {} is not set", config.llm.api_key_env)
        })?;
        Arc::new(
            AnthropicClient::new(&config.llm, api_key)
                .map_err(|err| anyhow::anyhow!("failed to build LLM client: {err}"))?,
        )
    };

    let validator: Arc<dyn CodeValidator> = Arc::new(StaticAnalysisValidator::new());

    let cost_guard: Arc<dyn CostGuard> = match (config.cost_guard.enabled, config.cost_guard.max_run_cost_usd) {
        (true, Some(budget)) => Arc::new(BudgetCostGuard::new(budget)),
        _ => Arc::new(MeteringCostGuard::new()),
    };

    let orchestrator = Arc::new(RetryOrchestrator::new(
        llm,
        validator,
        Some(cost_guard),
        metrics.clone(),
        config.retry.clone(),
        config.llm.model.clone(),
    ));
    let executor = Arc::new(WaveExecutor::new(
        orchestrator,
        metrics.clone(),
        config.executor.clone(),
    ));
    Ok(Arc::new(ExecutionService::new(executor, metrics)))
}
