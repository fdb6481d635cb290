//! Replay engine properties.
//!
//! Tests cover:
//! - Permutation invariance over seeded shuffles
//! - Monotonic state version
//! - At most one applied event per idempotency key
//! - Stale rejection ahead of deduplication
//! - Replay of an applied batch across passes
//! - A custom aggregate implementing the replay traits

use keel_core::replay::{
    Aggregate, Event, ReplayConfig, ReplayEngine, Snapshot, VersionedEvent,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn random_batch(rng: &mut StdRng, len: usize) -> Vec<Event> {
    (0..len)
        .map(|i| {
            Event::new(
                format!("e{i}"),
                rng.gen_range(0..20),
                format!("k{}", rng.gen_range(0..8)),
            )
            .with_delta("balance", rng.gen_range(-50..50))
            .with_delta("count", 1)
        })
        .collect()
}

// ============================================================================
// Property Tests
// ============================================================================

#[test]
fn test_permutation_invariance() {
    let engine = ReplayEngine::default();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..50 {
        let base = Snapshot::new(rng.gen_range(0..5)).with_field("balance", 100);
        let batch = random_batch(&mut rng, 24);
        let expected = engine.replay(&base, &batch);

        for _ in 0..5 {
            let mut shuffled = batch.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(engine.replay(&base, &shuffled), expected);
        }
    }
}

#[test]
fn test_version_is_monotonic() {
    let engine = ReplayEngine::default();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..50 {
        let base = Snapshot::new(rng.gen_range(0..20));
        let batch = random_batch(&mut rng, 16);
        let outcome = engine.replay(&base, &batch);

        assert!(outcome.state.version >= base.version);
        if outcome.applied() > 0 {
            let max_applied = batch
                .iter()
                .filter(|e| e.version >= base.version)
                .map(|e| e.version)
                .max()
                .unwrap_or(base.version);
            assert!(outcome.state.version <= max_applied);
        } else {
            assert_eq!(outcome.state.version, base.version);
        }
    }
}

#[test]
fn test_one_application_per_key() {
    let engine = ReplayEngine::default();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let batch = random_batch(&mut rng, 30);
        let outcome = engine.replay(&Snapshot::new(0), &batch);

        let distinct: HashSet<&str> = batch.iter().map(|e| e.idempotency_key()).collect();
        assert!(outcome.applied() <= distinct.len());
        // Every applied event bumps "count" by exactly one.
        assert_eq!(outcome.state.field("count") as usize, outcome.applied());
    }
}

#[test]
fn test_replaying_twice_is_noop_with_unique_keys() {
    let engine = ReplayEngine::default();
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..20 {
        let batch: Vec<Event> = (0..20)
            .map(|i| {
                Event::new(format!("e{i}"), rng.gen_range(0..20), format!("k{i}"))
                    .with_delta("balance", rng.gen_range(-50..50))
            })
            .collect();

        let first = engine.replay(&Snapshot::new(0), &batch);
        let second = engine.replay(&first.state, &batch);

        assert_eq!(second.applied(), 0);
        assert_eq!(second.state.fields, first.state.fields);
        assert_eq!(second.state.version, first.state.version);
        assert_eq!(second.report.skipped_stale, batch.len());
    }
}

#[test]
fn test_repeated_key_applies_next_version_on_each_pass() {
    let engine = ReplayEngine::default();
    let batch = vec![
        Event::new("low", 1, "k").with_delta("x", 1),
        Event::new("high", 2, "k").with_delta("x", 10),
    ];

    let first = engine.replay(&Snapshot::new(0), &batch);
    assert_eq!(first.applied(), 1);
    assert_eq!(first.state.field("x"), 1);
    assert_eq!(first.state.version, 1);

    let second = engine.replay(&first.state, &batch);
    assert_eq!(second.applied(), 1);
    assert_eq!(second.state.field("x"), 11);
    assert_eq!(second.state.version, 2);

    let third = engine.replay(&second.state, &batch);
    assert_eq!(third.applied(), 0);
    assert_eq!(third.state.fields, second.state.fields);
    assert_eq!(third.state.version, 2);
}

#[test]
fn test_batch_limit_drains_fresh_events_across_passes() {
    let engine = ReplayEngine::new(ReplayConfig { max_batch_size: 2 });
    let mut state = Snapshot::new(10);
    let batch = vec![
        Event::new("e1", 1, "k1").with_delta("x", 1),
        Event::new("e2", 2, "k2").with_delta("x", 1),
        Event::new("e11", 11, "k11").with_delta("x", 100),
        Event::new("e12", 12, "k12").with_delta("x", 200),
        Event::new("e13", 13, "k13").with_delta("x", 400),
    ];

    let first = engine.replay_into(&mut state, &batch);
    assert_eq!(first.applied, 2);
    assert_eq!(first.skipped_stale, 2);
    assert_eq!(first.truncated, 1);

    let second = engine.replay_into(&mut state, &batch);
    assert_eq!(second.applied, 1);
    assert_eq!(second.truncated, 0);

    assert_eq!(state.field("x"), 700);
    assert_eq!(state.version, 13);
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_stale_event_dropped_before_dedup() {
    let engine = ReplayEngine::default();
    let base = Snapshot::new(10)
        .with_field("generation", 300)
        .with_field("reserve", 40);
    let batch = vec![
        Event::new("old", 9, "dup")
            .with_delta("generation", 100)
            .with_delta("reserve", 100),
        Event::new("new", 11, "dup")
            .with_delta("generation", 7)
            .with_delta("reserve", 3),
    ];

    let outcome = engine.replay(&base, &batch);

    assert_eq!(outcome.applied(), 1);
    assert_eq!(outcome.state.field("generation"), 307);
    assert_eq!(outcome.state.field("reserve"), 43);
    assert_eq!(outcome.state.version, 11);
}

#[test]
fn test_batch_decoded_from_json() {
    let batch = Event::decode_batch(
        r#"[
            {"id": "e3", "version": 13, "idempotency_key": "k3", "deltas": {"generation": 8, "reserve": -2}},
            {"id": "e1", "version": 11, "idempotency_key": "k1", "deltas": {"generation": 30, "reserve": 4}},
            {"id": "e2", "version": 12, "idempotency_key": "k2", "deltas": {"generation": -10, "reserve": 1}}
        ]"#,
    )
    .unwrap();
    let base = Snapshot::from_json(r#"{"fields": {"generation": 500, "reserve": 70}, "version": 10}"#)
        .unwrap();

    let outcome = ReplayEngine::default().replay(&base, &batch);

    assert_eq!(outcome.state.field("generation"), 528);
    assert_eq!(outcome.state.field("reserve"), 73);
    assert_eq!(outcome.state.version, 13);
    assert_eq!(outcome.applied(), 3);
}

#[test]
fn test_truncation_is_order_independent() {
    let engine = ReplayEngine::new(ReplayConfig { max_batch_size: 3 });
    let mut rng = StdRng::seed_from_u64(3);
    let mut batch = random_batch(&mut rng, 10);
    // Keep every event ahead of the base so all ten are candidates.
    for event in &mut batch {
        event.version += 1;
    }
    let expected = engine.replay(&Snapshot::new(0), &batch);

    let mut shuffled = batch.clone();
    shuffled.shuffle(&mut rng);

    assert_eq!(engine.replay(&Snapshot::new(0), &shuffled), expected);
    assert_eq!(expected.report.truncated, 7);
    assert_eq!(expected.report.evaluated(), 3);
}

// ============================================================================
// Custom Aggregate Tests
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Transfer {
    id: String,
    seq: i64,
    key: String,
    amount: u64,
}

impl VersionedEvent for Transfer {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.seq
    }

    fn idempotency_key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Ledger {
    seq: i64,
    total: u64,
    entries: Vec<String>,
}

impl Aggregate for Ledger {
    type Event = Transfer;

    fn version(&self) -> i64 {
        self.seq
    }

    fn set_version(&mut self, version: i64) {
        self.seq = version;
    }

    fn apply(&mut self, event: &Transfer) {
        self.total += event.amount;
        self.entries.push(event.id.clone());
    }
}

#[test]
fn test_custom_aggregate_applies_in_canonical_order() {
    let transfer = |id: &str, seq: i64, key: &str, amount: u64| Transfer {
        id: id.to_string(),
        seq,
        key: key.to_string(),
        amount,
    };
    let batch = vec![
        transfer("t3", 2, "b", 5),
        transfer("t1", 1, "a", 10),
        transfer("t2", 2, "a", 99),
    ];

    let outcome = ReplayEngine::default().replay(&Ledger::default(), &batch);

    assert_eq!(outcome.state.entries, vec!["t1", "t3"]);
    assert_eq!(outcome.state.total, 15);
    assert_eq!(outcome.state.seq, 2);
    assert_eq!(outcome.report.skipped_duplicate, 1);
}
