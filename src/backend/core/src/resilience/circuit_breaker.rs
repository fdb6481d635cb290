//! Circuit Breaker for failure handling.
//!
//! Stops callers from hammering a failing dependency. The breaker never runs
//! the guarded operation itself: callers check [`CircuitBreaker::is_allowed`]
//! before doing work and report the outcome back.
//!
//! ```text
//! Closed   -> Open      failure_count >= failure_threshold
//! Open     -> HalfOpen  recovery_time elapsed since last failure (checked lazily)
//! HalfOpen -> Closed    half_open_success_threshold successes
//! HalfOpen -> Open      any failure
//! ```
//!
//! There is no Open -> Closed edge other than an explicit [`CircuitBreaker::reset`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::telemetry::BreakerMetrics;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIME: Duration = Duration::from_millis(30_000);
pub const DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD: u32 = 3;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests allowed
    #[default]
    Closed,
    /// Too many failures - requests blocked
    Open,
    /// Probing whether the dependency recovered - requests allowed
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Whether callers may attempt the guarded operation.
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Gauge encoding: 0 = closed, 1 = half-open, 2 = open.
    pub const fn gauge_value(&self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker thresholds.
///
/// Zero values are replaced by the defaults when a breaker is built, never
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures that trip the breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown after the last failure before probing (e.g. "30s")
    #[serde(default = "default_recovery_time", with = "humantime_serde")]
    pub recovery_time: Duration,

    /// Successes in half-open needed to close again
    #[serde(default = "default_half_open_success_threshold")]
    pub half_open_success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_time: default_recovery_time(),
            half_open_success_threshold: default_half_open_success_threshold(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_recovery_time() -> Duration {
    DEFAULT_RECOVERY_TIME
}

fn default_half_open_success_threshold() -> u32 {
    DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD
}

impl BreakerConfig {
    /// Build from raw signed values; non-positive inputs fall back to defaults.
    pub fn new(failure_threshold: i64, recovery_time_ms: i64) -> Self {
        let failure_threshold = if failure_threshold > 0 {
            u32::try_from(failure_threshold).unwrap_or(u32::MAX)
        } else {
            DEFAULT_FAILURE_THRESHOLD
        };
        let recovery_time = if recovery_time_ms > 0 {
            Duration::from_millis(recovery_time_ms as u64)
        } else {
            DEFAULT_RECOVERY_TIME
        };

        Self {
            failure_threshold,
            recovery_time,
            half_open_success_threshold: DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD,
        }
    }

    pub fn with_half_open_success_threshold(mut self, successes: u32) -> Self {
        self.half_open_success_threshold = successes;
        self
    }

    /// Replace zero thresholds with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.failure_threshold == 0 {
            self.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
        }
        if self.recovery_time.is_zero() {
            self.recovery_time = DEFAULT_RECOVERY_TIME;
        }
        if self.half_open_success_threshold == 0 {
            self.half_open_success_threshold = DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD;
        }
        self
    }

    pub fn recovery_time_ms(&self) -> u64 {
        u64::try_from(self.recovery_time.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Point-in-time view of a breaker, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub recovery_time_ms: u64,
    pub half_open_success_threshold: u32,
    pub last_failure_at_ms: Option<u64>,
    pub total_successes: u64,
    pub total_failures: u64,
}

#[derive(Debug, Default)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<u64>,
    total_successes: u64,
    total_failures: u64,
}

/// State the breaker should be in at `now_ms`, given its stored state.
///
/// Open becomes HalfOpen once `recovery_ms` has passed since the last failure.
/// Every other state is returned unchanged.
pub fn resolve_state(
    stored: CircuitState,
    last_failure_at_ms: Option<u64>,
    recovery_ms: u64,
    now_ms: u64,
) -> CircuitState {
    match (stored, last_failure_at_ms) {
        (CircuitState::Open, Some(at)) if now_ms.saturating_sub(at) >= recovery_ms => {
            CircuitState::HalfOpen
        }
        (state, _) => state,
    }
}

/// Circuit breaker for a single dependency.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &*self.inner.lock())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker backed by the system clock.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            name: "default".to_string(),
            config: config.normalized(),
            clock: Arc::new(SystemClock::new()),
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Name used in logs and metrics labels.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Swap the time source (tests, simulations).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state. Lazily moves Open to HalfOpen once the cooldown elapsed.
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        self.advance(&mut inner, now);
        inner.state
    }

    /// True iff the state is Closed or HalfOpen.
    pub fn is_allowed(&self) -> bool {
        self.state().is_allowed()
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        self.advance(&mut inner, now);
        inner.total_successes += 1;

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_success_threshold {
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.last_failure_at = None;
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                // Late result from a call admitted before the breaker tripped.
            }
        }
    }

    /// Record a failed call. Always refreshes the last-failure time.
    pub fn record_failure(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        self.advance(&mut inner, now);
        inner.total_failures += 1;
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker opened due to consecutive failures"
                    );
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                tracing::warn!(
                    breaker = %self.name,
                    "Circuit breaker re-opened after failed recovery probe"
                );
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker Closed and zero its counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure_at = None;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset");
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        self.advance(&mut inner, now);

        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            failure_threshold: self.config.failure_threshold,
            recovery_time_ms: self.config.recovery_time_ms(),
            half_open_success_threshold: self.config.half_open_success_threshold,
            last_failure_at_ms: inner.last_failure_at,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
        }
    }

    fn advance(&self, inner: &mut BreakerInner, now_ms: u64) {
        let resolved = resolve_state(
            inner.state,
            inner.last_failure_at,
            self.config.recovery_time_ms(),
            now_ms,
        );
        if resolved != inner.state {
            inner.success_count = 0;
            tracing::info!(breaker = %self.name, "Circuit breaker transitioning to half-open");
            self.transition(inner, resolved);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        inner.state = to;
        BreakerMetrics::record_transition(&self.name, to);
        if to == CircuitState::Closed {
            tracing::info!(breaker = %self.name, "Circuit breaker closed");
        }
    }
}
