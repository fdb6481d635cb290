//! Backoff calculator bounds.

use keel_core::resilience::{exponential_backoff, BackoffPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_doubling_schedule_scenario() {
    let delays: Vec<u64> = (0..=5)
        .map(|attempt| exponential_backoff(attempt, 100, 1600, 0.0))
        .collect();

    assert_eq!(delays, vec![100, 200, 400, 800, 1600, 1600]);
}

#[test]
fn test_delay_never_exceeds_cap() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..500 {
        let base = rng.gen_range(1..10_000u64);
        let max = rng.gen_range(base..1_000_000u64);
        let jitter = rng.gen_range(0.0..1.0);
        let policy = BackoffPolicy::new(base, max, jitter);

        for attempt in [0, 1, 5, 20, 62, 63, 1_000] {
            assert!(exponential_backoff(attempt, base, max, jitter) <= max);
            assert!(policy.delay_with_rng(attempt, &mut rng) <= max);
        }
    }
}

#[test]
fn test_delay_is_non_decreasing() {
    let policy = BackoffPolicy::new(37, 90_000, 0.25);
    let schedule = policy.schedule(70);

    assert!(schedule.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(*schedule.last().unwrap(), 90_000);
}

#[test]
fn test_default_policy() {
    let policy = BackoffPolicy::default();

    assert_eq!(policy.delay_ms(0), 110);
    assert_eq!(policy.delay_ms(30), 30_000);
}
