//! Per-stream progress tracking.
//!
//! Each stream holds the highest sequence known to be consumed. A global
//! watermark tracks the highest sequence recorded on any stream and drives the
//! `should_checkpoint` batching heuristic. `reconcile_checkpoints` yields the
//! point before which history is consumed by every stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::registry::KeyedRegistry;
use crate::telemetry::CheckpointMetrics;

/// Returned by `reconcile_checkpoints` when no stream has progressed.
pub const NO_SAFE_POINT: i64 = -1;

pub const DEFAULT_CHECKPOINT_INTERVAL: i64 = 1000;
pub const DEFAULT_MAX_REPORTED_GAPS: usize = 10_000;

/// Checkpoint manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Sequences past the watermark before a checkpoint should be persisted
    #[serde(default = "default_interval")]
    pub interval: i64,

    /// Upper bound on the gaps returned by a single scan
    #[serde(default = "default_max_reported_gaps")]
    pub max_reported_gaps: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            max_reported_gaps: default_max_reported_gaps(),
        }
    }
}

fn default_interval() -> i64 {
    DEFAULT_CHECKPOINT_INTERVAL
}

fn default_max_reported_gaps() -> usize {
    DEFAULT_MAX_REPORTED_GAPS
}

impl CheckpointConfig {
    /// Replace non-positive values with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.interval <= 0 {
            self.interval = DEFAULT_CHECKPOINT_INTERVAL;
        }
        if self.max_reported_gaps == 0 {
            self.max_reported_gaps = DEFAULT_MAX_REPORTED_GAPS;
        }
        self
    }
}

/// Tracks the consumed sequence of every stream.
#[derive(Debug, Default)]
pub struct CheckpointManager {
    config: CheckpointConfig,
    streams: KeyedRegistry<AtomicI64>,
    watermark: AtomicI64,
}

impl CheckpointManager {
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            config: config.normalized(),
            streams: KeyedRegistry::new(),
            watermark: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    fn stream(&self, stream_id: &str) -> Arc<AtomicI64> {
        self.streams.get_or_insert_with(stream_id, || AtomicI64::new(0))
    }

    fn raise_watermark(&self, sequence: i64) {
        let previous = self.watermark.fetch_max(sequence, Ordering::AcqRel);
        if sequence > previous {
            CheckpointMetrics::set_watermark(sequence);
        }
    }

    /// Advance `stream_id` to `sequence`. A lower sequence is ignored.
    pub fn record(&self, stream_id: &str, sequence: i64) {
        let previous = self.stream(stream_id).fetch_max(sequence, Ordering::AcqRel);
        if sequence < previous {
            tracing::warn!(
                stream = stream_id,
                current = previous,
                requested = sequence,
                "Ignoring checkpoint regression"
            );
            return;
        }
        self.raise_watermark(sequence);
    }

    /// Set `stream_id` to `sequence` even if that moves it backward.
    ///
    /// Returns false (and changes nothing) for a non-positive sequence; only
    /// `reset` zeroes a stream.
    pub fn force_record(&self, stream_id: &str, sequence: i64) -> bool {
        if sequence <= 0 {
            tracing::warn!(
                stream = stream_id,
                requested = sequence,
                "Refusing to force checkpoint to a non-positive sequence"
            );
            return false;
        }

        let previous = self.stream(stream_id).swap(sequence, Ordering::AcqRel);
        if sequence < previous {
            tracing::info!(
                stream = stream_id,
                from = previous,
                to = sequence,
                "Checkpoint moved backward by override"
            );
        }
        self.raise_watermark(sequence);
        true
    }

    /// Checkpoint for `stream_id`; an unseen stream reads as 0.
    pub fn get_checkpoint(&self, stream_id: &str) -> i64 {
        self.streams
            .get(stream_id)
            .map(|seq| seq.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Highest sequence recorded on any stream.
    pub fn last_sequence(&self) -> i64 {
        self.watermark.load(Ordering::Acquire)
    }

    /// Whether `current` is far enough past the watermark to persist.
    pub fn should_checkpoint(&self, current: i64) -> bool {
        current.saturating_sub(self.last_sequence()) >= self.config.interval
    }

    /// Sequences in `(checkpoint, expected_max]` absent from `sequences`.
    ///
    /// The stream's checkpoint then advances to `expected_max`: the scan
    /// counts as having seen everything up to it. At most
    /// `max_reported_gaps` sequences are returned, lowest first.
    pub fn detect_gaps(&self, stream_id: &str, sequences: &[i64], expected_max: i64) -> Vec<i64> {
        let stream = self.stream(stream_id);
        let checkpoint = stream.load(Ordering::Acquire);
        if expected_max <= checkpoint {
            return Vec::new();
        }

        let mut seen: Vec<i64> = sequences
            .iter()
            .copied()
            .filter(|seq| *seq > checkpoint && *seq <= expected_max)
            .collect();
        seen.sort_unstable();
        seen.dedup();

        let limit = self.config.max_reported_gaps;
        let mut gaps = Vec::new();
        let mut next = checkpoint + 1;
        for seq in seen.into_iter().chain(std::iter::once(expected_max.saturating_add(1))) {
            while next < seq && gaps.len() < limit {
                gaps.push(next);
                next += 1;
            }
            if gaps.len() >= limit {
                break;
            }
            next = seq.saturating_add(1);
        }

        stream.fetch_max(expected_max, Ordering::AcqRel);
        self.raise_watermark(expected_max);

        CheckpointMetrics::record_gaps(stream_id, gaps.len());
        if !gaps.is_empty() {
            tracing::debug!(
                stream = stream_id,
                from = checkpoint,
                to = expected_max,
                missing = gaps.len(),
                "Sequence gaps detected"
            );
        }

        gaps
    }

    /// Lowest non-zero checkpoint across streams, or `NO_SAFE_POINT`.
    pub fn reconcile_checkpoints(&self) -> i64 {
        self.streams
            .snapshot()
            .values()
            .map(|seq| seq.load(Ordering::Acquire))
            .filter(|seq| *seq != 0)
            .min()
            .unwrap_or(NO_SAFE_POINT)
    }

    /// Checkpoint of every tracked stream, ordered by stream id.
    pub fn checkpoints(&self) -> BTreeMap<String, i64> {
        self.streams
            .snapshot()
            .into_iter()
            .map(|(id, seq)| (id, seq.load(Ordering::Acquire)))
            .collect()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Forget every stream and zero the watermark.
    pub fn reset(&self) {
        self.streams.clear();
        self.watermark.store(0, Ordering::Release);
        CheckpointMetrics::set_watermark(0);
        tracing::info!("Checkpoints reset");
    }
}
