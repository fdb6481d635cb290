//! Circuit breaker commands.
//!
//! `simulate` drives a breaker with a scripted sequence of outcomes against a
//! manual clock, printing the state after every step.

use anyhow::Result;
use clap::Subcommand;
use keel_core::clock::{Clock, ManualClock};
use keel_core::config::Config;
use keel_core::resilience::{BreakerConfig, CircuitBreakerPool, CircuitState};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum BreakerCommands {
    /// Run a scripted outcome sequence through a breaker
    ///
    /// Steps: `s` success, `f` failure, `+<ms>` advance the clock, `?` probe.
    Simulate {
        /// Comma separated steps, e.g. `f,f,f,+30000,?,s,s,s`
        #[arg(value_delimiter = ',', required = true)]
        steps: Vec<Step>,

        /// Service name used for the breaker
        #[arg(short, long, default_value = "simulated")]
        service: String,

        /// Override the configured failure threshold
        #[arg(long)]
        failure_threshold: Option<i64>,

        /// Override the configured recovery time (ms)
        #[arg(long)]
        recovery_ms: Option<i64>,

        /// Override the configured half-open success threshold
        #[arg(long)]
        half_open_successes: Option<u32>,
    },
}

/// One scripted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Success,
    Failure,
    Advance(u64),
    Probe,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        match token.to_ascii_lowercase().as_str() {
            "s" | "ok" | "success" => Ok(Step::Success),
            "f" | "fail" | "failure" => Ok(Step::Failure),
            "?" | "probe" => Ok(Step::Probe),
            other => other
                .strip_prefix('+')
                .and_then(|ms| ms.parse::<u64>().ok())
                .map(Step::Advance)
                .ok_or_else(|| format!("unknown step '{token}' (expected s, f, ? or +<ms>)")),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Success => f.write_str("success"),
            Step::Failure => f.write_str("failure"),
            Step::Advance(ms) => write!(f, "+{ms}ms"),
            Step::Probe => f.write_str("probe"),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Clock (ms)")]
    clock_ms: u64,
    #[tabled(rename = "State")]
    state: CircuitState,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Probe successes")]
    successes: u32,
    #[tabled(rename = "Allowed")]
    allowed: bool,
}

pub fn execute(cmd: BreakerCommands, settings: &Config, format: OutputFormat) -> Result<()> {
    match cmd {
        BreakerCommands::Simulate {
            steps,
            service,
            failure_threshold,
            recovery_ms,
            half_open_successes,
        } => {
            let mut config = settings.breaker.clone();
            if let Some(threshold) = failure_threshold {
                let recovery = i64::try_from(config.recovery_time_ms()).unwrap_or(i64::MAX);
                config.failure_threshold = BreakerConfig::new(threshold, recovery).failure_threshold;
            }
            if let Some(ms) = recovery_ms {
                let threshold = i64::from(config.failure_threshold);
                config.recovery_time = BreakerConfig::new(threshold, ms).recovery_time;
            }
            if let Some(successes) = half_open_successes {
                config = config.with_half_open_success_threshold(successes);
            }

            let rows = simulate(&service, config, &steps);

            if format == OutputFormat::Table {
                output::print_header(&format!("Breaker simulation: {service}"));
            }
            output::print_list(&rows, format)?;
        }
    }

    Ok(())
}

fn simulate(service: &str, config: BreakerConfig, steps: &[Step]) -> Vec<StepRow> {
    let clock = Arc::new(ManualClock::new());
    let pool = CircuitBreakerPool::new(config).with_clock(clock.clone());
    let breaker = pool.get(service);

    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            match step {
                Step::Success => pool.record_result(service, true),
                Step::Failure => pool.record_result(service, false),
                Step::Advance(ms) => clock.advance_ms(*ms),
                Step::Probe => {}
            }

            let snapshot = breaker.snapshot();
            StepRow {
                index: index + 1,
                step: step.to_string(),
                clock_ms: clock.now_ms(),
                state: snapshot.state,
                failures: snapshot.failure_count,
                successes: snapshot.success_count,
                allowed: snapshot.state.is_allowed(),
            }
        })
        .collect()
}
