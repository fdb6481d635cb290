//! Backoff schedule command.

use anyhow::Result;
use clap::Args;
use keel_core::config::Config;
use keel_core::resilience::BackoffPolicy;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct BackoffArgs {
    /// Number of attempts to show
    #[arg(short = 'n', long, default_value = "8")]
    attempts: usize,

    /// Override the base delay (ms)
    #[arg(long)]
    base_delay_ms: Option<u64>,

    /// Override the maximum delay (ms)
    #[arg(long)]
    max_delay_ms: Option<u64>,

    /// Override the jitter fraction (0.0 - 1.0)
    #[arg(long)]
    jitter: Option<f64>,
}

#[derive(Debug, Serialize, Tabled)]
struct DelayRow {
    #[tabled(rename = "Attempt")]
    attempt: usize,
    #[tabled(rename = "Delay (ms)")]
    delay_ms: u64,
    #[tabled(rename = "Cumulative (ms)")]
    cumulative_ms: u64,
}

pub fn execute(args: BackoffArgs, settings: &Config, format: OutputFormat) -> Result<()> {
    let policy = BackoffPolicy {
        base_delay_ms: args.base_delay_ms.unwrap_or(settings.backoff.base_delay_ms),
        max_delay_ms: args.max_delay_ms.unwrap_or(settings.backoff.max_delay_ms),
        jitter_fraction: args.jitter.unwrap_or(settings.backoff.jitter_fraction),
    };

    let rows = schedule_rows(&policy, args.attempts);

    if format == OutputFormat::Table {
        output::print_header("Backoff schedule");
        output::print_detail("Base", &format!("{} ms", policy.base_delay_ms));
        output::print_detail("Max", &format!("{} ms", policy.max_delay_ms));
        output::print_detail("Jitter", &format!("{}", policy.jitter_fraction));
        println!();
    }
    output::print_list(&rows, format)
}

fn schedule_rows(policy: &BackoffPolicy, attempts: usize) -> Vec<DelayRow> {
    let mut cumulative = 0u64;
    policy
        .schedule(attempts)
        .into_iter()
        .enumerate()
        .map(|(attempt, delay_ms)| {
            cumulative = cumulative.saturating_add(delay_ms);
            DelayRow {
                attempt,
                delay_ms,
                cumulative_ms: cumulative,
            }
        })
        .collect()
}
