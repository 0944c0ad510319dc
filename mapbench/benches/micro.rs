//! Criterion microbenchmarks for record generation and aggregation.
//!
//! Run with: `cargo bench --bench micro`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mapbench::aggregate::{p95_by_map, summarize, throughput_by_threads};
use mapbench::{Corpus, ProfileRegistry, ScalingModel, SuiteConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn corpus(repeats: u32) -> Corpus {
    let suite = SuiteConfig {
        repeats,
        ..SuiteConfig::default()
    };
    let registry = ProfileRegistry::builtin();
    let model = suite.scaling_model().unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let mut corpus = Corpus::with_capacity(suite.total_runs());
    for combo in suite.combinations() {
        let entry = registry.lookup(&combo.map, &combo.workload).unwrap();
        corpus.push(model.generate(&entry, combo.threads, combo.repeat, &mut rng).unwrap());
    }
    corpus
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let registry = ProfileRegistry::builtin();
    let model = ScalingModel::default();

    for threads in [1u32, 4] {
        group.bench_with_input(BenchmarkId::new("skiplist/mixed", threads), &threads, |b, &t| {
            let entry = registry.lookup("skiplist", "mixed").unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            let mut repeat = 0u32;
            b.iter(|| {
                repeat = repeat.wrapping_add(1).max(1);
                model.generate(&entry, t, repeat, &mut rng).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for repeats in [2u32, 50, 500] {
        let corpus = corpus(repeats);
        group.bench_with_input(BenchmarkId::new("throughput_by_threads", corpus.len()), &corpus, |b, c| {
            b.iter(|| throughput_by_threads(c, "read-heavy"));
        });
        group.bench_with_input(BenchmarkId::new("p95_by_map", corpus.len()), &corpus, |b, c| {
            b.iter(|| p95_by_map(c));
        });
        group.bench_with_input(BenchmarkId::new("summarize", corpus.len()), &corpus, |b, c| {
            b.iter(|| summarize(c));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generate, bench_aggregate);
criterion_main!(benches);
