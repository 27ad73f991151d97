//! # sylva-consumer
//!
//! The delta-consumption pipeline: periodically retrieves an ordered stream
//! of published change-set files (or a full snapshot on first run), replays
//! them into one or more named graphs of a local store, and tracks progress
//! durably so a restart resumes exactly where the previous successful run
//! left off.
//!
//! ## Pipeline
//!
//! ```text
//! TimestampResolver → DeltaCatalog → (per file, in order)
//!     DeltaFileLoader → (per change-set) ChangeSetApplier
//! ```
//!
//! Control flow is strictly sequential within a run. The orchestrator
//! ([`run::ConsumptionRun`]) is the only component with side effects on
//! run/job state; the others only touch the store or the network.
//!
//! ## Guarantees
//!
//! - Files are applied in creation order; change-sets in arrival order;
//!   deletions before insertions within each change-set.
//! - The resume cursor advances only on successful completion, so an
//!   aborted run replays from the same point (at-least-once, never gaps).
//! - A failed run is surfaced on the triggering task with its error
//!   message; partially applied statements remain visible, not rolled back.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod applier;
pub mod catalog;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod run;
pub mod snapshot;
pub mod store;
pub mod task;

pub use applier::ChangeSetApplier;
pub use catalog::{DeltaCatalog, DeltaFileDescriptor, FileFormat};
pub use error::{Error, Result};
pub use loader::{DeltaFileLoader, LoadedDeltaFile, RawFileSink, StagedDeltaFile};
pub use resolver::TimestampResolver;
pub use run::{ConsumptionRun, RunOptions, RunReport, RunState, WriteTargets};
pub use snapshot::{Snapshot, SnapshotLoader};
pub use store::SparqlGraphStore;
pub use task::{
    FileArtifact, MemoryTaskStore, ResultContainer, Task, TaskStore, TaskType, TriggerEvent,
};
