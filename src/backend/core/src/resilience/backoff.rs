//! Exponential backoff with jitter.
//!
//! The calculator only computes a delay. Waiting is the caller's job, on
//! whatever timer it owns.
//!
//! The jittered result never exceeds `max_delay_ms`: jitter is derived from
//! the already-capped delay and the sum is capped again.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest shift applied to the base delay; keeps `1 << attempt` inside u64.
pub const MAX_ATTEMPT_SHIFT: i64 = 62;

/// Delay before retry `attempt` (0-based), with proportional jitter.
///
/// `attempt` is clamped to `[0, 62]`, `jitter_fraction` to `[0, 1]` (NaN reads
/// as 0). A product that overflows saturates at `max_delay_ms`.
pub fn exponential_backoff(
    attempt: i64,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_fraction: f64,
) -> u64 {
    let capped = capped_delay(attempt, base_delay_ms, max_delay_ms);
    let jitter = (capped as f64 * clamp_fraction(jitter_fraction)) as u64;
    capped.saturating_add(jitter).min(max_delay_ms)
}

fn capped_delay(attempt: i64, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let shift = attempt.clamp(0, MAX_ATTEMPT_SHIFT) as u32;
    base_delay_ms
        .checked_mul(1u64 << shift)
        .unwrap_or(max_delay_ms)
        .min(max_delay_ms)
}

fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Retry delay policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for any delay, jitter included
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter as a fraction of the capped delay (0.0 - 1.0)
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_fraction() -> f64 {
    0.1
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, jitter_fraction: f64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_fraction,
        }
    }

    /// Deterministic delay in milliseconds (proportional jitter).
    pub fn delay_ms(&self, attempt: i64) -> u64 {
        exponential_backoff(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_fraction,
        )
    }

    pub fn delay(&self, attempt: i64) -> Duration {
        Duration::from_millis(self.delay_ms(attempt))
    }

    /// Delay with jitter drawn uniformly from `[0, capped * jitter_fraction]`.
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: i64, rng: &mut R) -> u64 {
        let capped = capped_delay(attempt, self.base_delay_ms, self.max_delay_ms);
        let spread = capped as f64 * clamp_fraction(self.jitter_fraction);
        let jitter = if spread >= 1.0 {
            rng.gen_range(0.0..=spread) as u64
        } else {
            0
        };
        capped.saturating_add(jitter).min(self.max_delay_ms)
    }

    /// Randomized delay using the thread-local RNG.
    pub fn jittered_delay(&self, attempt: i64) -> Duration {
        Duration::from_millis(self.delay_with_rng(attempt, &mut rand::thread_rng()))
    }

    /// Deterministic delays for attempts `0..attempts`.
    pub fn schedule(&self, attempts: usize) -> Vec<u64> {
        (0..attempts as i64).map(|attempt| self.delay_ms(attempt)).collect()
    }
}
