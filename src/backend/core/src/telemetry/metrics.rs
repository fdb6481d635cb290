//! Prometheus metrics for the resilience core.
//!
//! Components record through the `metrics` facade; nothing is exported until a
//! recorder is installed with [`init_metrics`]. Without one every call below is
//! a no-op, which keeps the components usable in tests and embedded callers.
//!
//! # Example
//!
//! ```rust,no_run
//! use keel_core::telemetry::metrics::{init_metrics, MetricsConfig};
//!
//! let registry = init_metrics(&MetricsConfig::default(), "keel").expect("metrics");
//! println!("{}", registry.render());
//! ```

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::quorum::QuorumHealth;
use crate::resilience::CircuitState;

pub const REPLAY_EVENTS_TOTAL: &str = "keel_replay_events_total";
pub const REPLAY_PASSES_TOTAL: &str = "keel_replay_passes_total";
pub const BREAKER_TRANSITIONS_TOTAL: &str = "keel_breaker_transitions_total";
pub const BREAKER_STATE: &str = "keel_breaker_state";
pub const CHECKPOINT_GAPS_TOTAL: &str = "keel_checkpoint_gaps_total";
pub const CHECKPOINT_WATERMARK: &str = "keel_checkpoint_watermark";
pub const QUORUM_EVALUATIONS_TOTAL: &str = "keel_quorum_evaluations_total";
pub const ERRORS_TOTAL: &str = "keel_errors_total";

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: BTreeMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            global_labels: BTreeMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Handle to the installed Prometheus recorder, if any.
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry that records nothing.
    pub fn disabled() -> Self {
        Self {
            prometheus_handle: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// # Errors
///
/// Returns an error if another recorder is already installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new().add_global_label("service", service_name);
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!(REPLAY_EVENTS_TOTAL, "Replayed events by outcome");
    describe_counter!(REPLAY_PASSES_TOTAL, "Replay passes executed");
    describe_counter!(BREAKER_TRANSITIONS_TOTAL, "Circuit breaker state transitions");
    describe_gauge!(
        BREAKER_STATE,
        "Circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_counter!(CHECKPOINT_GAPS_TOTAL, "Missing sequence numbers found by gap scans");
    describe_gauge!(CHECKPOINT_WATERMARK, "Highest sequence recorded across streams");
    describe_counter!(QUORUM_EVALUATIONS_TOTAL, "Quorum health classifications");
    describe_counter!(ERRORS_TOTAL, "Errors raised by the ambient layer");
}

/// Replay pass outcome counters.
pub struct ReplayMetrics;

impl ReplayMetrics {
    pub fn record_pass(applied: usize, stale: usize, duplicate: usize, malformed: usize) {
        counter!(REPLAY_PASSES_TOTAL).increment(1);
        for (outcome, count) in [
            ("applied", applied),
            ("stale", stale),
            ("duplicate", duplicate),
            ("malformed", malformed),
        ] {
            if count > 0 {
                counter!(REPLAY_EVENTS_TOTAL, "outcome" => outcome).increment(count as u64);
            }
        }
    }
}

/// Circuit breaker transition metrics.
pub struct BreakerMetrics;

impl BreakerMetrics {
    pub fn record_transition(service: &str, to: CircuitState) {
        counter!(
            BREAKER_TRANSITIONS_TOTAL,
            "service" => service.to_string(),
            "to" => to.as_str(),
        )
        .increment(1);
        gauge!(BREAKER_STATE, "service" => service.to_string()).set(to.gauge_value());
    }
}

/// Checkpoint progress metrics.
pub struct CheckpointMetrics;

impl CheckpointMetrics {
    pub fn record_gaps(stream_id: &str, missing: usize) {
        if missing > 0 {
            counter!(CHECKPOINT_GAPS_TOTAL, "stream" => stream_id.to_string())
                .increment(missing as u64);
        }
    }

    pub fn set_watermark(sequence: i64) {
        gauge!(CHECKPOINT_WATERMARK).set(sequence as f64);
    }
}

/// Quorum classification metrics.
pub struct QuorumMetrics;

impl QuorumMetrics {
    pub fn record_health(health: QuorumHealth) {
        counter!(QUORUM_EVALUATIONS_TOTAL, "health" => health.as_str()).increment(1);
    }
}
