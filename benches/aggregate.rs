use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use reality::core::consensus::{Aggregator, ScoringMode};
use reality::core::gate::{GateThresholds, evaluate};
use reality::core::observation::{Facts, Observation};
use reality::core::trust::TrustHierarchy;
use serde_json::json;

const SOURCES: [&str; 5] = ["github", "git", "filesystem", "supabase", "vercel"];

/// `facts` facts per source; every tenth one disagrees across sources.
fn observations(facts: usize) -> Vec<Observation> {
    SOURCES
        .iter()
        .enumerate()
        .map(|(s, source)| {
            let mut map = Facts::new();
            for i in 0..facts {
                let value = if i % 10 == 0 { json!(s) } else { json!(i) };
                map.insert(format!("fact_{i}"), value);
            }
            Observation::new(source, map, 0.5 + s as f64 / 10.0, 0).unwrap()
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let trust = TrustHierarchy::new(SOURCES).unwrap();

    for facts in [10usize, 100, 1_000] {
        let obs = observations(facts);
        for mode in [ScoringMode::Unweighted, ScoringMode::Confidence] {
            let aggregator = Aggregator::new(trust.clone(), mode);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mode).to_lowercase(), facts),
                &obs,
                |b, obs| {
                    b.iter(|| aggregator.aggregate("bench", black_box(obs), vec![], false, 0));
                },
            );
        }
    }
    group.finish();
}

fn bench_gate(c: &mut Criterion) {
    let report = Aggregator::new(TrustHierarchy::new(SOURCES).unwrap(), ScoringMode::Unweighted)
        .aggregate("bench", &observations(100), vec![], false, 0);
    let thresholds = GateThresholds {
        required_facts: (0..50).map(|i| format!("fact_{i}")).collect(),
        ..GateThresholds::default()
    };
    c.bench_function("gate_evaluate", |b| {
        b.iter(|| evaluate(black_box(Some(&report)), &thresholds, 10))
    });
}

criterion_group!(benches, bench_aggregate, bench_gate);
criterion_main!(benches);
