//! End-to-end solve throughput benchmarks: scaling the program size along a
//! plain join and a disjunctive-choice axis.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hexsolver::orchestrator::{solve, SolveLimits};
use hexsolver::plugin::PluginTable;
use hexsolver::propagator::DeferConfig;
use hexsolver::registry::Registry;

fn chain_source(n: u32) -> String {
    let mut src = String::new();
    for i in 0..n {
        src.push_str(&format!("edge({i},{}).\n", i + 1));
    }
    src.push_str("path(X,Y) :- edge(X,Y).\n");
    src
}

fn choice_source(n: u32) -> String {
    let mut src = String::new();
    for i in 0..n {
        src.push_str(&format!("a{i} v b{i}.\n"));
    }
    src
}

fn bench_plain_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("plain_join");
    for size in [10u32, 100, 500] {
        let source = chain_source(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| {
                let registry = Registry::new();
                let plugins = PluginTable::new();
                solve(&registry, &plugins, source, SolveLimits::default(), DeferConfig::default()).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_disjunctive_choice(c: &mut Criterion) {
    let mut group = c.benchmark_group("disjunctive_choice");
    for size in [4u32, 8, 12] {
        let source = choice_source(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| {
                let registry = Registry::new();
                let plugins = PluginTable::new();
                solve(&registry, &plugins, source, SolveLimits::default(), DeferConfig::default()).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plain_join, bench_disjunctive_choice);
criterion_main!(benches);
