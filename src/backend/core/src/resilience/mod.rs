//! Failure handling for calls to other services.
//!
//! Breakers decide whether a call may be attempted; backoff decides how long a
//! caller waits before trying again. Neither performs the call or the wait.

pub mod backoff;
pub mod circuit_breaker;
pub mod pool;

pub use backoff::{exponential_backoff, BackoffPolicy, MAX_ATTEMPT_SHIFT};
pub use circuit_breaker::{
    resolve_state, BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD, DEFAULT_RECOVERY_TIME,
};
pub use pool::CircuitBreakerPool;
