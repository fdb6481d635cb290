//! Deterministic replay of a batch of versioned events onto a base state.
//!
//! Events are first put in canonical order: `(version, idempotency_key, id)`
//! ascending. The engine then walks that order:
//!
//! 1. An event without an idempotency key is malformed and dropped.
//! 2. An event at or below the base version is stale and dropped: the base
//!    already folds in everything up to and including its own version.
//! 3. At most `max_batch_size` of the remaining candidates are evaluated; the
//!    rest are left for the next pass.
//! 4. A candidate whose idempotency key was already applied in this pass is
//!    dropped.
//! 5. Anything else is applied and the running version moves to the event's.
//!
//! Because the order is canonical, any permutation of the same batch yields the
//! same state and the same applied count.
//!
//! Duplicates resolve first-commit-wins: the *lowest* fresh version carrying a
//! key is the one applied. Staleness is decided before deduplication, so a
//! stale copy of a key never shadows a fresh one. The flip side: replaying an
//! applied batch again is a no-op only when each key appears at a single
//! version. If a key appears at several versions, the copy applied last time is
//! now stale and the next higher copy applies. Callers that need strict
//! idempotency across passes must collapse duplicates before handing the batch
//! over.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use super::event::{Aggregate, VersionedEvent};
use crate::telemetry::ReplayMetrics;

/// Replay engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Most fresh events evaluated in one pass (0 = unlimited). Stale and
    /// malformed events never count against it. Excess candidates at the tail
    /// of the canonical order are left for the next pass.
    #[serde(default)]
    pub max_batch_size: usize,
}

/// Counters describing one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub applied: usize,
    pub skipped_stale: usize,
    pub skipped_duplicate: usize,
    pub skipped_malformed: usize,
    /// Fresh events beyond `max_batch_size`, not evaluated in this pass.
    pub truncated: usize,
}

impl ReplayReport {
    /// Events the pass evaluated (everything except truncated ones).
    pub fn evaluated(&self) -> usize {
        self.applied + self.skipped_stale + self.skipped_duplicate + self.skipped_malformed
    }
}

/// New state plus the report of how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome<S> {
    pub state: S,
    pub report: ReplayReport,
}

impl<S> ReplayOutcome<S> {
    pub fn applied(&self) -> usize {
        self.report.applied
    }
}

/// Stateless replay engine. Safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    config: ReplayConfig,
}

impl ReplayEngine {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replay `events` onto a copy of `base`.
    pub fn replay<A: Aggregate>(&self, base: &A, events: &[A::Event]) -> ReplayOutcome<A> {
        let mut state = base.clone();
        let report = self.replay_into(&mut state, events);
        ReplayOutcome { state, report }
    }

    /// Replay `events` onto `state` in place.
    pub fn replay_into<A: Aggregate>(&self, state: &mut A, events: &[A::Event]) -> ReplayReport {
        let mut report = ReplayReport::default();
        if events.is_empty() {
            return report;
        }

        let base_version = state.version();
        let mut candidates = Vec::with_capacity(events.len());

        for event in canonical_order(events) {
            if event.idempotency_key().is_empty() {
                tracing::debug!(event_id = event.id(), "Skipping event without idempotency key");
                report.skipped_malformed += 1;
                continue;
            }

            // Candidates are sorted ascending, so none can fall behind the
            // running version once the base filter has passed.
            if event.version() <= base_version {
                tracing::trace!(
                    event_id = event.id(),
                    event_version = event.version(),
                    base_version,
                    "Dropping stale event"
                );
                report.skipped_stale += 1;
                continue;
            }

            candidates.push(event);
        }

        if self.config.max_batch_size > 0 && candidates.len() > self.config.max_batch_size {
            report.truncated = candidates.len() - self.config.max_batch_size;
            candidates.truncate(self.config.max_batch_size);
        }

        let mut seen_keys: HashSet<&str> = HashSet::with_capacity(candidates.len());

        for event in candidates {
            let key = event.idempotency_key();
            if !seen_keys.insert(key) {
                tracing::trace!(
                    event_id = event.id(),
                    idempotency_key = key,
                    "Dropping duplicate event"
                );
                report.skipped_duplicate += 1;
                continue;
            }

            state.apply(event);
            state.set_version(event.version());
            report.applied += 1;
        }

        state.record_applied(report.applied);

        ReplayMetrics::record_pass(
            report.applied,
            report.skipped_stale,
            report.skipped_duplicate,
            report.skipped_malformed,
        );
        tracing::debug!(
            applied = report.applied,
            stale = report.skipped_stale,
            duplicate = report.skipped_duplicate,
            malformed = report.skipped_malformed,
            truncated = report.truncated,
            version = state.version(),
            "Replay pass complete"
        );

        report
    }
}

/// Total order used by every replay pass.
pub fn canonical_cmp<E: VersionedEvent>(a: &E, b: &E) -> Ordering {
    a.version()
        .cmp(&b.version())
        .then_with(|| a.idempotency_key().cmp(b.idempotency_key()))
        .then_with(|| a.id().cmp(b.id()))
}

fn canonical_order<E: VersionedEvent>(events: &[E]) -> Vec<&E> {
    let mut ordered: Vec<&E> = events.iter().collect();
    ordered.sort_by(|a, b| canonical_cmp(*a, *b));
    ordered
}
