//! Event replay.
//!
//! - **`event`**: the `VersionedEvent` and `Aggregate` traits plus the concrete
//!   `Event`/`Snapshot` pair carrying named numeric deltas.
//! - **`engine`**: the `ReplayEngine`, which folds a batch onto a base state in
//!   canonical order with stale and duplicate suppression.

pub mod engine;
pub mod event;

pub use engine::{canonical_cmp, ReplayConfig, ReplayEngine, ReplayOutcome, ReplayReport};
pub use event::{Aggregate, Event, Snapshot, VersionedEvent};
