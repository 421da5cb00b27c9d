//! Plan execution throughput over instant mock ports.

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use uuid::Uuid;

use codewave::adapters::llm::MockLlmClient;
use codewave::adapters::validators::StaticAnalysisValidator;
use codewave::domain::models::{Atom, ExecutionPlan, ExecutorConfig, RetryConfig, Wave};
use codewave::domain::ports::{MetricsSink, NoopMetricsSink};
use codewave::services::{RetryOrchestrator, WaveExecutor};

fn build_plan(waves: usize, atoms_per_wave: usize) -> (ExecutionPlan, HashMap<String, Atom>) {
    let mut plan = ExecutionPlan::default();
    let mut atoms = HashMap::new();
    let mut previous: Vec<String> = Vec::new();

    for wave_index in 0..waves {
        let mut ids = Vec::new();
        for n in 0..atoms_per_wave {
            let id = format!("w{wave_index}n{n}");
            let deps = previous.first().cloned().into_iter().collect();
            atoms.insert(
                id.clone(),
                Atom::new(&id, "generate a helper function", "python").with_dependencies(deps),
            );
            ids.push(id);
        }
        plan.waves.push(Wave {
            index: wave_index,
            atom_ids: ids.clone(),
        });
        previous = ids;
    }

    (plan, atoms)
}

fn build_executor(max_concurrency: usize) -> Arc<WaveExecutor> {
    let metrics: Arc<dyn MetricsSink> = Arc::new(NoopMetricsSink);
    let orchestrator = Arc::new(RetryOrchestrator::new(
        Arc::new(MockLlmClient::new()),
        Arc::new(StaticAnalysisValidator::new()),
        None,
        metrics.clone(),
        RetryConfig::default(),
        "sonnet",
    ));
    Arc::new(WaveExecutor::new(
        orchestrator,
        metrics,
        ExecutorConfig { max_concurrency },
    ))
}

fn bench_plan_execution(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("plan_execution");

    for atoms_per_wave in [10usize, 50, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(atoms_per_wave),
            &atoms_per_wave,
            |b, &atoms_per_wave| {
                let executor = build_executor(100);
                b.to_async(&rt).iter(|| {
                    let executor = executor.clone();
                    let (plan, mut atoms) = build_plan(4, atoms_per_wave);
                    async move {
                        executor
                            .execute_plan(Uuid::new_v4(), &plan, &mut atoms)
                            .await
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_plan_execution);
criterion_main!(benches);
