//! Quorum evaluation command.

use anyhow::Result;
use clap::{Args, ValueEnum};
use keel_core::config::Config;
use keel_core::quorum::{QuorumBoundary, QuorumEvaluator, QuorumHealth, Vote};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use crate::input;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Boundary {
    Inclusive,
    Exclusive,
}

impl From<Boundary> for QuorumBoundary {
    fn from(boundary: Boundary) -> Self {
        match boundary {
            Boundary::Inclusive => QuorumBoundary::Inclusive,
            Boundary::Exclusive => QuorumBoundary::Exclusive,
        }
    }
}

#[derive(Args)]
pub struct QuorumArgs {
    /// Votes (JSON or YAML array of {node_id, epoch, approved, weight?})
    #[arg(long)]
    votes: PathBuf,

    /// Node weights (JSON or YAML map of node_id -> weight)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Cluster size; defaults to the number of votes
    #[arg(short = 'n', long)]
    total_nodes: Option<usize>,

    /// Override the configured minimum approval ratio
    #[arg(long)]
    min_ratio: Option<f64>,

    /// Override the configured ratio comparison
    #[arg(long, value_enum)]
    boundary: Option<Boundary>,

    /// Degraded nodes excluded from leadership, comma separated
    #[arg(long, value_delimiter = ',')]
    degraded: Vec<String>,

    /// Only count votes from the highest epoch present
    #[arg(long)]
    latest_epoch: bool,
}

#[derive(Debug, Serialize)]
struct QuorumReport {
    votes: usize,
    total_nodes: usize,
    approval_ratio: f64,
    weighted_approval: f64,
    min_ratio: f64,
    has_quorum: bool,
    health: QuorumHealth,
    byzantine_tolerance: usize,
    byzantine_quorum: bool,
    eligible_leaders: Vec<String>,
}

pub fn execute(args: QuorumArgs, settings: &Config, format: OutputFormat) -> Result<()> {
    let mut config = settings.quorum.clone();
    if let Some(boundary) = args.boundary {
        config.boundary = boundary.into();
    }
    let min_ratio = args.min_ratio.unwrap_or(config.min_ratio);
    let evaluator = QuorumEvaluator::new(config);

    let mut votes: Vec<Vote> = input::read_document(&args.votes)?;
    if args.latest_epoch {
        votes = evaluator.latest_epoch(&votes);
    }
    let weights: HashMap<String, f64> = match &args.weights {
        Some(path) => input::read_document(path)?,
        None => HashMap::new(),
    };

    let total_nodes = args.total_nodes.unwrap_or(votes.len()).max(votes.len());
    let candidates: Vec<String> = votes
        .iter()
        .map(|vote| vote.node_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let degraded: HashSet<String> = args.degraded.into_iter().collect();

    let report = QuorumReport {
        votes: votes.len(),
        total_nodes,
        approval_ratio: evaluator.approval_ratio(&votes),
        weighted_approval: evaluator.weighted_approval(&votes, &weights),
        min_ratio,
        has_quorum: evaluator.has_quorum(&votes, min_ratio),
        health: evaluator.quorum_health(&votes, total_nodes),
        byzantine_tolerance: evaluator.byzantine_tolerance(total_nodes),
        byzantine_quorum: evaluator.byzantine_quorum(&votes, total_nodes),
        eligible_leaders: evaluator.eligible_leaders(&candidates, &degraded),
    };

    match format {
        OutputFormat::Table => {
            output::print_header("Quorum");
            output::print_detail("Votes", &format!("{} of {}", report.votes, report.total_nodes));
            output::print_detail("Approval", &format!("{:.3}", report.approval_ratio));
            output::print_detail("Weighted", &format!("{:.3}", report.weighted_approval));
            output::print_detail(
                "Quorum",
                &format!("{} (min {:.2})", output::flag(report.has_quorum), report.min_ratio),
            );
            output::print_detail("Health", report.health.as_str());
            output::print_detail(
                "Byzantine",
                &format!(
                    "{} (tolerates {})",
                    output::flag(report.byzantine_quorum),
                    report.byzantine_tolerance
                ),
            );
            output::print_detail("Leaders", &report.eligible_leaders.join(", "));
        }
        _ => output::print_item(&report, format)?,
    }

    Ok(())
}
