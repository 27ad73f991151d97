//! Change-set application.
//!
//! Applies one change-set to the configured target graph(s): deletions
//! first, then insertions, in that fixed order. Delete-before-insert is
//! required so that a change-set removing and re-adding statements for the
//! same subject converges to the final state instead of being lost to
//! ordering. The ordering is per change-set, never globally reordered.

use std::collections::HashSet;

use sylva_core::{ChangeSet, GraphStore, GraphUri, Statement};

use crate::error::Result;

/// Applies change-sets to target graphs through the store contract.
///
/// Has no built-in retry: a store failure propagates immediately and is
/// terminal for the run. Statements already applied by earlier change-sets
/// remain applied - partial application is a visible failure mode, not
/// silently rolled back, because the store is not assumed transactional
/// across calls.
pub struct ChangeSetApplier<'a> {
    store: &'a dyn GraphStore,
    batch_size: usize,
}

impl<'a> ChangeSetApplier<'a> {
    /// Creates an applier over the given store.
    #[must_use]
    pub fn new(store: &'a dyn GraphStore, batch_size: usize) -> Self {
        Self { store, batch_size }
    }

    /// Applies one change-set to every target graph, deletions before
    /// insertions, chunked by the configured batch size.
    ///
    /// Returns the set of distinct subjects present in the insertions, for
    /// audit and downstream indexing.
    ///
    /// # Errors
    ///
    /// Propagates the first store error without retrying.
    pub async fn apply(
        &self,
        change_set: &ChangeSet,
        targets: &[GraphUri],
    ) -> Result<HashSet<String>> {
        for graph in targets {
            self.mutate(&change_set.deletions, graph, Mutation::Delete)
                .await?;
        }
        for graph in targets {
            self.mutate(&change_set.insertions, graph, Mutation::Insert)
                .await?;
        }

        Ok(change_set
            .insertions
            .iter()
            .map(|s| s.subject.clone())
            .collect())
    }

    async fn mutate(
        &self,
        statements: &[Statement],
        graph: &GraphUri,
        mutation: Mutation,
    ) -> Result<()> {
        for batch in statements.chunks(self.batch_size.max(1)) {
            match mutation {
                Mutation::Delete => self.store.delete(batch, graph).await?,
                Mutation::Insert => self.store.insert(batch, graph).await?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Mutation {
    Delete,
    Insert,
}
