//! Replay command.
//!
//! Reads an event batch and an optional base snapshot, folds the batch onto
//! the snapshot and prints the resulting state and pass counters.

use anyhow::Result;
use clap::Args;
use keel_core::config::Config;
use keel_core::replay::{Event, ReplayConfig, ReplayEngine, Snapshot};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

use crate::input;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ReplayArgs {
    /// Event batch (JSON or YAML array)
    #[arg(short, long)]
    events: PathBuf,

    /// Base snapshot (defaults to an empty snapshot at version 0)
    #[arg(short, long)]
    base: Option<PathBuf>,

    /// Override the configured batch limit (0 = unlimited)
    #[arg(long)]
    max_batch_size: Option<usize>,
}

#[derive(Debug, Serialize, Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Before")]
    before: i64,
    #[tabled(rename = "After")]
    after: i64,
}

#[derive(Serialize)]
struct ReplayResult<'a> {
    state: &'a Snapshot,
    applied: usize,
    skipped_stale: usize,
    skipped_duplicate: usize,
    skipped_malformed: usize,
    truncated: usize,
}

pub fn execute(args: ReplayArgs, settings: &Config, format: OutputFormat) -> Result<()> {
    let events: Vec<Event> = input::read_document(&args.events)?;
    let base: Snapshot = match &args.base {
        Some(path) => input::read_document(path)?,
        None => Snapshot::default(),
    };

    let config = ReplayConfig {
        max_batch_size: args
            .max_batch_size
            .unwrap_or(settings.replay.max_batch_size),
    };
    let outcome = ReplayEngine::new(config).replay(&base, &events);
    let report = outcome.report;

    match format {
        OutputFormat::Table => {
            output::print_header("Replay");
            output::print_detail("Events", &events.len().to_string());
            output::print_detail("Applied", &report.applied.to_string());
            output::print_detail("Stale", &report.skipped_stale.to_string());
            output::print_detail("Duplicate", &report.skipped_duplicate.to_string());
            output::print_detail("Malformed", &report.skipped_malformed.to_string());
            if report.truncated > 0 {
                output::print_detail("Truncated", &report.truncated.to_string());
            }
            output::print_detail(
                "Version",
                &format!("{} -> {}", base.version, outcome.state.version),
            );

            let mut names: Vec<&String> = base.fields.keys().collect();
            names.extend(outcome.state.fields.keys());
            names.sort();
            names.dedup();
            let rows: Vec<FieldRow> = names
                .into_iter()
                .map(|name| FieldRow {
                    field: name.clone(),
                    before: base.field(name),
                    after: outcome.state.field(name),
                })
                .collect();

            println!();
            output::print_list(&rows, format)?;

            if report.applied == 0 {
                output::print_info("No events applied; state is unchanged");
            }
            if report.truncated > 0 {
                output::print_warning(&format!(
                    "{} events beyond the batch limit were not evaluated",
                    report.truncated
                ));
            }
        }
        _ => output::print_item(
            &ReplayResult {
                state: &outcome.state,
                applied: report.applied,
                skipped_stale: report.skipped_stale,
                skipped_duplicate: report.skipped_duplicate,
                skipped_malformed: report.skipped_malformed,
                truncated: report.truncated,
            },
            format,
        )?,
    }

    Ok(())
}
