//! Sweep throughput over listings of increasing size

use chrono::{TimeDelta, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use policy_engine::{classify, ReaperEngine};
use reaper_core::{InMemoryClient, Machine, MachineState};
use std::hint::black_box;
use std::time::Duration;

fn listing(size: usize) -> Vec<Machine> {
    let now = Utc::now();
    (0..size)
        .map(|index| {
            let state = match index % 3 {
                0 => MachineState::Running,
                1 => MachineState::Stopped,
                _ => MachineState::Provisioning,
            };
            let age = TimeDelta::hours((index % 48) as i64);
            Machine::new(format!("vm-{index}"), state, now - age)
        })
        .collect()
}

fn benchmark_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("reaper_classification");

    for size in [1, 10, 100, 1000].iter() {
        let machines = listing(*size);
        let now = Utc::now();
        group.bench_with_input(BenchmarkId::new("classify", size), &machines, |b, machines| {
            b.iter(|| {
                for machine in machines {
                    black_box(classify(machine, now, 12).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("reaper_sweep");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("delete_old_machines", size), size, |b, &size| {
            b.iter_batched(
                || InMemoryClient::new(listing(size)),
                |client| {
                    let engine = ReaperEngine::new(&client, Duration::ZERO);
                    black_box(engine.delete_old_machines(12, "ops").unwrap());
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_classification, benchmark_sweep);
criterion_main!(benches);
