//! Snapshot loader boundary for the full-sync branch.
//!
//! First-time bootstrap loads a complete point-in-time dump instead of
//! replaying deltas. The loader itself is an external collaborator; only
//! its interface is defined here.

use async_trait::async_trait;

use sylva_core::GraphUri;

use crate::error::Result;

/// A point-in-time dump ready to be loaded into a target graph.
#[async_trait]
pub trait Snapshot: Send + Sync {
    /// Loads the snapshot content and dispatches it into the target graph.
    async fn load_and_dispatch(&self, target: &GraphUri) -> Result<()>;
}

/// Supplies the latest published snapshot.
#[async_trait]
pub trait SnapshotLoader: Send + Sync {
    /// Returns the latest snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Snapshot`] when no snapshot is available or
    /// the lookup fails; fatal for a full-sync run.
    async fn load_latest_snapshot(&self) -> Result<Box<dyn Snapshot>>;
}
