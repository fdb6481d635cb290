//! Gap detection command.

use anyhow::{bail, Result};
use clap::Args;
use keel_core::checkpoint::CheckpointManager;
use keel_core::config::Config;
use serde::Serialize;
use std::path::PathBuf;

use crate::input;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct GapsArgs {
    /// Stream identifier
    #[arg(short, long, default_value = "default")]
    stream: String,

    /// Observed sequence numbers, comma separated
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    seq: Vec<i64>,

    /// File holding a JSON or YAML array of observed sequence numbers
    #[arg(long, conflicts_with = "seq")]
    seq_file: Option<PathBuf>,

    /// Stream checkpoint before the scan
    #[arg(long, default_value = "0")]
    checkpoint: i64,

    /// Highest sequence the stream should have reached
    #[arg(long)]
    expected_max: i64,
}

#[derive(Serialize)]
struct GapReport<'a> {
    stream: &'a str,
    checkpoint_before: i64,
    checkpoint_after: i64,
    missing: Vec<i64>,
}

pub fn execute(args: GapsArgs, settings: &Config, format: OutputFormat) -> Result<()> {
    if args.checkpoint < 0 {
        bail!("--checkpoint must not be negative");
    }

    let sequences: Vec<i64> = match &args.seq_file {
        Some(path) => input::read_document(path)?,
        None => args.seq.clone(),
    };

    let manager = CheckpointManager::new(settings.checkpoint.clone());
    manager.record(&args.stream, args.checkpoint);
    let missing = manager.detect_gaps(&args.stream, &sequences, args.expected_max);

    let report = GapReport {
        stream: &args.stream,
        checkpoint_before: args.checkpoint,
        checkpoint_after: manager.get_checkpoint(&args.stream),
        missing,
    };

    match format {
        OutputFormat::Table => {
            output::print_header(&format!("Gap scan: {}", report.stream));
            output::print_detail(
                "Checkpoint",
                &format!("{} -> {}", report.checkpoint_before, report.checkpoint_after),
            );
            output::print_detail("Observed", &sequences.len().to_string());

            if report.missing.is_empty() {
                output::print_success("No gaps");
            } else {
                output::print_detail("Missing", &summarize(&report.missing));
                if report.missing.len() >= settings.checkpoint.max_reported_gaps {
                    output::print_warning("Gap report truncated at max_reported_gaps");
                }
            }
        }
        _ => output::print_item(&report, format)?,
    }

    Ok(())
}

/// Collapse sorted sequences into ranges: `[3, 4, 5, 9]` -> `3-5, 9`.
fn summarize(sorted: &[i64]) -> String {
    let mut parts = Vec::new();
    let mut iter = sorted.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(next) = end.checked_add(1).filter(|next| iter.peek() == Some(next)) {
            end = next;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }

    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_ranges() {
        assert_eq!(summarize(&[6]), "6");
        assert_eq!(summarize(&[3, 4, 5, 9, 11, 12]), "3-5, 9, 11-12");
        assert_eq!(summarize(&[]), "");
    }

    #[test]
    fn test_summarize_range_ending_at_max() {
        assert_eq!(
            summarize(&[i64::MAX - 2, i64::MAX - 1, i64::MAX]),
            format!("{}-{}", i64::MAX - 2, i64::MAX)
        );
        assert_eq!(summarize(&[i64::MAX]), i64::MAX.to_string());
    }
}
