//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: `tracing` events from every component, rendered as JSON,
//!   pretty or compact output once a subscriber is installed
//! - **Metrics**: counters and gauges for replay outcomes, breaker transitions,
//!   checkpoint gaps and quorum health
//!
//! # Example
//!
//! ```rust,no_run
//! use keel_core::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::default();
//! let handle = init_telemetry(&config).expect("Failed to initialize telemetry");
//! println!("{}", handle.metrics.render());
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, BreakerMetrics, CheckpointMetrics, MetricsConfig, MetricsRegistry,
    QuorumMetrics, ReplayMetrics,
};

use serde::{Deserialize, Serialize};

/// Unified telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every metric
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "keel".to_string()
}

/// Handle for the installed telemetry stack.
#[derive(Debug)]
pub struct TelemetryHandle {
    /// Metrics handle for rendering the registry
    pub metrics: MetricsRegistry,
}

/// Initialize logging and metrics. Call once at process startup.
///
/// # Errors
///
/// Returns an error if either global recorder/subscriber is already set or
/// the log filter cannot be parsed.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryHandle> {
    let metrics = init_metrics(&config.metrics, &config.service_name)?;
    init_logging(&config.logging)?;

    ::tracing::debug!(service_name = %config.service_name, "Telemetry initialized");

    Ok(TelemetryHandle { metrics })
}
