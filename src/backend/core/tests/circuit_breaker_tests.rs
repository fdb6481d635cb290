//! State transition tests for circuit breakers and the breaker pool.
//!
//! Tests cover:
//! - State transitions (Closed -> Open -> HalfOpen -> Closed)
//! - Failure threshold triggering
//! - Recovery timeout behavior against a manual clock
//! - Threshold normalization
//! - Concurrent access scenarios

use keel_core::clock::ManualClock;
use keel_core::resilience::{
    BreakerConfig, CircuitBreaker, CircuitBreakerPool, CircuitState, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_RECOVERY_TIME,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn breaker(threshold: i64, recovery_ms: i64) -> (CircuitBreaker, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::new(BreakerConfig::new(threshold, recovery_ms))
        .with_name("test")
        .with_clock(clock.clone());
    (breaker, clock)
}

// ============================================================================
// Creation Tests
// ============================================================================

#[test]
fn test_circuit_breaker_creation_default_state() {
    let (breaker, _) = breaker(5, 1000);

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.is_allowed());
}

#[test]
fn test_non_positive_thresholds_fall_back_to_defaults() {
    for (threshold, recovery) in [(0, 0), (-3, -1), (0, 500), (4, 0)] {
        let config = CircuitBreaker::new(BreakerConfig::new(threshold, recovery))
            .config()
            .clone();
        if threshold <= 0 {
            assert_eq!(config.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
        }
        if recovery <= 0 {
            assert_eq!(config.recovery_time, DEFAULT_RECOVERY_TIME);
        }
    }
}

// ============================================================================
// State Transition: Closed -> Open Tests
// ============================================================================

#[test]
fn test_transition_closed_to_open_on_failures() {
    let (breaker, _) = breaker(3, 1000);

    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Closed);

    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Closed);

    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.is_allowed());
}

#[test]
fn test_success_resets_consecutive_failures() {
    let (breaker, _) = breaker(3, 1000);

    breaker.record_failure();
    breaker.record_failure();
    breaker.record_success();
    breaker.record_failure();
    breaker.record_failure();

    assert_eq!(breaker.state(), CircuitState::Closed);
}

// ============================================================================
// State Transition: Open -> HalfOpen -> Closed Tests
// ============================================================================

#[test]
fn test_full_recovery_cycle() {
    let (breaker, clock) = breaker(3, 1000);

    for _ in 0..3 {
        breaker.record_failure();
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(Duration::from_millis(999));
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(Duration::from_millis(1));
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert!(breaker.is_allowed());

    let needed = breaker.config().half_open_success_threshold;
    for _ in 0..needed {
        breaker.record_success();
    }

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    assert_eq!(snapshot.success_count, 0);
}

#[test]
fn test_half_open_failure_reopens() {
    let (breaker, clock) = breaker(1, 500);

    breaker.record_failure();
    clock.advance_ms(500);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.record_success();
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    // The cooldown restarts from the latest failure.
    clock.advance_ms(499);
    assert_eq!(breaker.state(), CircuitState::Open);
    clock.advance_ms(1);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[test]
fn test_failure_while_open_extends_cooldown() {
    let (breaker, clock) = breaker(1, 1000);

    breaker.record_failure();
    clock.advance_ms(800);
    breaker.record_failure();
    clock.advance_ms(800);

    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn test_no_direct_open_to_closed_edge() {
    let (breaker, _) = breaker(1, 1000);

    breaker.record_failure();
    for _ in 0..10 {
        breaker.record_success();
    }

    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn test_reset_forces_closed() {
    let (breaker, _) = breaker(1, 60_000);

    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    breaker.reset();
    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    assert_eq!(snapshot.last_failure_at_ms, None);
}

#[test]
fn test_state_labels() {
    assert_eq!(CircuitState::Closed.as_str(), "closed");
    assert_eq!(CircuitState::Open.as_str(), "open");
    assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    assert_eq!(
        serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
        "\"half_open\""
    );
}

// ============================================================================
// Concurrent Access Tests
// ============================================================================

#[test]
fn test_concurrent_success_recording() {
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::new(10, 1000)));
    let mut handles = vec![];

    for _ in 0..100 {
        let breaker_clone = breaker.clone();
        handles.push(thread::spawn(move || {
            breaker_clone.record_success();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.total_successes, 100);
    assert_eq!(snapshot.state, CircuitState::Closed);
}

#[test]
fn test_concurrent_failure_recording_trips_once() {
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::new(50, 60_000)));
    let mut handles = vec![];

    for _ in 0..100 {
        let breaker_clone = breaker.clone();
        handles.push(thread::spawn(move || {
            breaker_clone.record_failure();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.total_failures, 100);
    assert_eq!(snapshot.state, CircuitState::Open);
}

#[test]
fn test_concurrent_pool_creation_converges() {
    let pool = Arc::new(CircuitBreakerPool::new(BreakerConfig::new(3, 60_000)));
    let mut handles = vec![];

    for i in 0..32 {
        let pool = pool.clone();
        handles.push(thread::spawn(move || {
            let service = format!("svc-{}", i % 4);
            pool.record_result(&service, false);
            pool.get(&service)
        }));
    }

    let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(pool.len(), 4);
    for breaker in &breakers {
        assert!(Arc::ptr_eq(breaker, &pool.get(breaker.name())));
    }
    for snapshot in pool.snapshots() {
        assert_eq!(snapshot.total_failures, 8);
        assert_eq!(snapshot.state, CircuitState::Open);
    }
}
