//! Vote tallying and quorum decisions.
//!
//! Every operation is a pure function of the votes handed in plus the
//! evaluator's `QuorumConfig`. A missed quorum is a value, never an error.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::telemetry::QuorumMetrics;

// =============================================================================
// Votes
// =============================================================================

/// A single node's vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub node_id: String,
    #[serde(default)]
    pub epoch: i64,
    pub approved: bool,
    /// Voting weight; absent means 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Vote {
    pub fn new(node_id: impl Into<String>, epoch: i64, approved: bool) -> Self {
        Self {
            node_id: node_id.into(),
            epoch,
            approved,
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// How the approval ratio is compared against the minimum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuorumBoundary {
    /// `ratio >= min_ratio`
    #[default]
    Inclusive,
    /// `ratio > min_ratio`
    Exclusive,
}

/// Order in which eligible leaders are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderOrder {
    #[default]
    Ascending,
    Descending,
}

/// Ratio floors for each health bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Ratio at or above which quorum is adequate
    #[serde(default = "default_adequate")]
    pub adequate: f64,

    /// Ratio at or above which quorum is strong
    #[serde(default = "default_strong")]
    pub strong: f64,

    /// Ratio strictly above which quorum is weak rather than failed
    #[serde(default = "default_weak")]
    pub weak: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            adequate: default_adequate(),
            strong: default_strong(),
            weak: default_weak(),
        }
    }
}

fn default_adequate() -> f64 {
    0.90
}

fn default_strong() -> f64 {
    0.66
}

fn default_weak() -> f64 {
    0.50
}

fn default_min_ratio() -> f64 {
    0.66
}

/// Quorum evaluation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumConfig {
    /// Approval ratio required by `meets_quorum`
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,

    #[serde(default)]
    pub boundary: QuorumBoundary,

    #[serde(default)]
    pub leader_order: LeaderOrder,

    #[serde(default)]
    pub health: HealthThresholds,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            min_ratio: default_min_ratio(),
            boundary: QuorumBoundary::default(),
            leader_order: LeaderOrder::default(),
            health: HealthThresholds::default(),
        }
    }
}

// =============================================================================
// Health
// =============================================================================

/// Coarse classification of an approval ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuorumHealth {
    Adequate,
    Strong,
    Weak,
    Failed,
}

impl QuorumHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuorumHealth::Adequate => "adequate",
            QuorumHealth::Strong => "strong",
            QuorumHealth::Weak => "weak",
            QuorumHealth::Failed => "failed",
        }
    }
}

impl fmt::Display for QuorumHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Stateless quorum evaluator.
#[derive(Debug, Clone, Default)]
pub struct QuorumEvaluator {
    config: QuorumConfig,
}

impl QuorumEvaluator {
    pub fn new(config: QuorumConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// Approved votes over all votes; 0.0 for no votes.
    pub fn approval_ratio(&self, votes: &[Vote]) -> f64 {
        if votes.is_empty() {
            return 0.0;
        }
        approvals(votes) as f64 / votes.len() as f64
    }

    /// Compare the approval ratio against `min_ratio` using the configured boundary.
    pub fn has_quorum(&self, votes: &[Vote], min_ratio: f64) -> bool {
        let ratio = self.approval_ratio(votes);
        match self.config.boundary {
            QuorumBoundary::Inclusive => ratio >= min_ratio,
            QuorumBoundary::Exclusive => ratio > min_ratio,
        }
    }

    /// `has_quorum` against the configured `min_ratio`.
    pub fn meets_quorum(&self, votes: &[Vote]) -> bool {
        self.has_quorum(votes, self.config.min_ratio)
    }

    /// Approved weight over total weight.
    ///
    /// A node's weight comes from `weights`, then from the vote itself, then
    /// defaults to 1.0. Non-finite or negative weights count as zero.
    pub fn weighted_approval(&self, votes: &[Vote], weights: &HashMap<String, f64>) -> f64 {
        let mut approved = 0.0;
        let mut total = 0.0;

        for vote in votes {
            let weight = weights
                .get(&vote.node_id)
                .copied()
                .or(vote.weight)
                .unwrap_or(1.0);
            let weight = if weight.is_finite() && weight > 0.0 {
                weight
            } else {
                0.0
            };

            total += weight;
            if vote.approved {
                approved += weight;
            }
        }

        if total <= 0.0 {
            0.0
        } else {
            (approved / total).min(1.0)
        }
    }

    /// Bucket approvals out of `max(total_nodes, votes.len())`.
    pub fn quorum_health(&self, votes: &[Vote], total_nodes: usize) -> QuorumHealth {
        let participants = total_nodes.max(votes.len());
        let health = if participants == 0 {
            QuorumHealth::Failed
        } else {
            self.classify(approvals(votes) as f64 / participants as f64)
        };

        QuorumMetrics::record_health(health);
        tracing::debug!(
            approvals = approvals(votes),
            participants = participants,
            health = health.as_str(),
            "Quorum health evaluated"
        );
        health
    }

    fn classify(&self, ratio: f64) -> QuorumHealth {
        let thresholds = &self.config.health;
        if ratio >= thresholds.adequate {
            QuorumHealth::Adequate
        } else if ratio >= thresholds.strong {
            QuorumHealth::Strong
        } else if ratio > thresholds.weak {
            QuorumHealth::Weak
        } else {
            QuorumHealth::Failed
        }
    }

    /// Maximum faulty nodes tolerable among `total_nodes`.
    pub fn byzantine_tolerance(&self, total_nodes: usize) -> usize {
        total_nodes / 3
    }

    /// Whether approvals reach `2f + 1` for `f = byzantine_tolerance(n)`.
    pub fn byzantine_quorum(&self, votes: &[Vote], total_nodes: usize) -> bool {
        let participants = total_nodes.max(votes.len());
        if participants == 0 {
            return false;
        }
        let faulty = self.byzantine_tolerance(participants);
        approvals(votes) >= 2 * faulty + 1
    }

    /// Candidates that are not degraded, in the configured order.
    ///
    /// Falls back to every candidate when all are degraded so the result is
    /// never empty for a non-empty candidate list.
    pub fn eligible_leaders(&self, candidates: &[String], degraded: &HashSet<String>) -> Vec<String> {
        let mut eligible: Vec<String> = candidates
            .iter()
            .filter(|candidate| !degraded.contains(*candidate))
            .cloned()
            .collect();

        if eligible.is_empty() && !candidates.is_empty() {
            tracing::warn!(
                candidates = candidates.len(),
                "All leader candidates degraded, falling back to full list"
            );
            eligible = candidates.to_vec();
        }

        eligible.sort();
        eligible.dedup();
        if self.config.leader_order == LeaderOrder::Descending {
            eligible.reverse();
        }
        eligible
    }

    /// Votes from the highest epoch present, one per node (first one wins).
    pub fn latest_epoch(&self, votes: &[Vote]) -> Vec<Vote> {
        let Some(epoch) = votes.iter().map(|vote| vote.epoch).max() else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        votes
            .iter()
            .filter(|vote| vote.epoch == epoch && seen.insert(vote.node_id.as_str()))
            .cloned()
            .collect()
    }
}

fn approvals(votes: &[Vote]) -> usize {
    votes.iter().filter(|vote| vote.approved).count()
}
