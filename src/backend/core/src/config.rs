//! Configuration management.
//!
//! Every component takes its own configuration value at construction, so there
//! is no process-wide threshold table. This module only aggregates them and
//! loads them from a file and/or `KEEL__*` environment variables.

use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointConfig;
use crate::error::Result;
use crate::quorum::QuorumConfig;
use crate::replay::ReplayConfig;
use crate::resilience::{BackoffPolicy, BreakerConfig};
use crate::telemetry::TelemetryConfig;

const ENV_PREFIX: &str = "KEEL";
const ENV_SEPARATOR: &str = "__";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Replay engine configuration
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Checkpoint manager configuration
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Default thresholds for every breaker created by a pool
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Retry delay policy
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Quorum evaluation policy
    #[serde(default)]
    pub quorum: QuorumConfig,

    /// Logging and metrics
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from environment variables only.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(Self::environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }
}
