#![allow(clippy::result_large_err)]
//! # Keel Core
//!
//! Resilience and coordination primitives for services that must tolerate
//! unreliable delivery, flaky dependencies and replica disagreement.
//!
//! ## Architecture
//!
//! - **Replay**: Deterministic, order-independent folding of versioned events onto a base state
//! - **Checkpoints**: Per-stream progress, gap detection and safe truncation points
//! - **Circuit Breakers**: Per-dependency failure state machines with a lazily populated pool
//! - **Backoff**: Capped exponential retry delays with jitter
//! - **Quorum**: Approval ratios, health buckets, weighted and Byzantine variants
//! - **Telemetry**: Structured logging and Prometheus metrics
//!
//! None of the components performs I/O or waits. Callers own transport,
//! persistence and timers; the core only computes decisions.

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod error;
pub mod quorum;
pub mod registry;
pub mod replay;
pub mod resilience;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorSeverity, KeelError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::checkpoint::{CheckpointConfig, CheckpointManager, NO_SAFE_POINT};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, ErrorContext, ErrorSeverity, KeelError, Result};
    pub use crate::quorum::{
        HealthThresholds, LeaderOrder, QuorumBoundary, QuorumConfig, QuorumEvaluator,
        QuorumHealth, Vote,
    };
    pub use crate::registry::KeyedRegistry;
    pub use crate::replay::{
        Aggregate, Event, ReplayConfig, ReplayEngine, ReplayOutcome, ReplayReport, Snapshot,
        VersionedEvent,
    };
    pub use crate::resilience::{
        exponential_backoff, BackoffPolicy, BreakerConfig, BreakerSnapshot, CircuitBreaker,
        CircuitBreakerPool, CircuitState,
    };
    pub use crate::telemetry::{init_telemetry, TelemetryConfig, TelemetryHandle};
}
