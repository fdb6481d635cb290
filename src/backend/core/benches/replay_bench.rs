//! Benchmarks for the replay engine.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keel_core::replay::{Event, ReplayEngine, Snapshot};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn batch(size: usize, distinct_keys: usize) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(size as u64);
    let mut events: Vec<Event> = (0..size)
        .map(|i| {
            Event::new(format!("evt-{i}"), (i / 4) as i64 + 1, format!("key-{}", i % distinct_keys))
                .with_delta("balance", rng.gen_range(-100..100))
                .with_delta("count", 1)
        })
        .collect();
    events.shuffle(&mut rng);
    events
}

fn bench_replay_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_batch");
    let engine = ReplayEngine::default();
    let base = Snapshot::new(0).with_field("balance", 1_000);
    for size in [100, 1_000, 10_000] {
        let events = batch(size, size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| { b.iter(|| black_box(engine.replay(&base, events))); });
    }
    group.finish();
}

fn bench_replay_duplicate_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_duplicate_heavy");
    let engine = ReplayEngine::default();
    let base = Snapshot::new(0);
    for keys in [10, 100, 1_000] {
        let events = batch(10_000, keys);
        group.bench_with_input(BenchmarkId::new("distinct_keys", keys), &events, |b, events| { b.iter(|| black_box(engine.replay(&base, events))); });
    }
    group.finish();
}

fn bench_replay_second_pass(c: &mut Criterion) {
    let engine = ReplayEngine::default();
    let events = batch(5_000, 5_000);
    let applied = engine.replay(&Snapshot::new(0), &events).state;
    c.bench_function("replay_second_pass_noop", |b| { b.iter(|| black_box(engine.replay(&applied, &events))); });
}

criterion_group!(benches, bench_replay_batch, bench_replay_duplicate_heavy, bench_replay_second_pass);
criterion_main!(benches);
