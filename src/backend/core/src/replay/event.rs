//! Versioned events and the aggregate state they fold into.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

// =============================================================================
// Traits
// =============================================================================

/// An event that can take part in a replay pass.
pub trait VersionedEvent {
    /// Unique event identifier; final tie-break in canonical order.
    fn id(&self) -> &str;

    /// Ordinal assigned by the producer.
    fn version(&self) -> i64;

    /// Identifier shared by every delivery of the same logical event.
    fn idempotency_key(&self) -> &str;
}

/// State that can be rebuilt from versioned events.
///
/// `apply` must be a pure function of `(self, event)`: no I/O, no failure.
/// The engine owns version bookkeeping, so `apply` should only touch the
/// aggregate's own fields.
pub trait Aggregate: Clone {
    type Event: VersionedEvent;

    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    fn apply(&mut self, event: &Self::Event);

    /// Called once per pass with the number of events applied.
    fn record_applied(&mut self, _applied: usize) {}
}

// =============================================================================
// Event
// =============================================================================

/// An immutable event carrying named numeric deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub version: i64,
    pub idempotency_key: String,
    #[serde(default)]
    pub deltas: BTreeMap<String, i64>,
}

impl Event {
    pub fn new(id: impl Into<String>, version: i64, idempotency_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version,
            idempotency_key: idempotency_key.into(),
            deltas: BTreeMap::new(),
        }
    }

    /// Add (or replace) a delta for a field.
    pub fn with_delta(mut self, field: impl Into<String>, amount: i64) -> Self {
        self.deltas.insert(field.into(), amount);
        self
    }

    /// Decode a JSON array of events.
    pub fn decode_batch(json: &str) -> Result<Vec<Event>> {
        Ok(serde_json::from_str(json)?)
    }
}

impl VersionedEvent for Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Aggregate of named counters plus replay bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub fields: BTreeMap<String, i64>,
    #[serde(default)]
    pub version: i64,
    /// Events applied across every pass seeded from this snapshot's lineage.
    #[serde(default)]
    pub applied_count: u64,
}

impl Snapshot {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: i64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Current value of a field; absent fields read as zero.
    pub fn field(&self, name: &str) -> i64 {
        self.fields.get(name).copied().unwrap_or(0)
    }

    /// Decode a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Snapshot> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Aggregate for Snapshot {
    type Event = Event;

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn apply(&mut self, event: &Event) {
        for (field, delta) in &event.deltas {
            let value = self.fields.entry(field.clone()).or_insert(0);
            *value = value.saturating_add(*delta);
        }
    }

    fn record_applied(&mut self, applied: usize) {
        self.applied_count = self.applied_count.saturating_add(applied as u64);
    }
}
