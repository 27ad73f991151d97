//! Graph store abstraction for named-graph stores.
//!
//! This module defines the statement-level mutation contract the pipeline
//! applies change-sets through. The store itself is an external dependency;
//! implementations wrap whatever endpoint actually holds the data.
//!
//! Mutations are expected to have set semantics: deleting an absent
//! statement and inserting a present one are both no-ops. The consumption
//! pipeline relies on this for at-least-once replay after an aborted run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::statement::Statement;

/// The URI of a named graph within the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphUri(String);

impl GraphUri {
    /// Creates a graph URI from a string.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Returns the URI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GraphUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GraphUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

/// Statement-level mutation contract for a named-graph store.
///
/// Implementations are expected to apply each call atomically for the given
/// batch, but the pipeline does not assume transactionality across calls:
/// a failed run may leave earlier batches applied, which is surfaced rather
/// than rolled back.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Removes the given statements from the named graph.
    ///
    /// Deleting statements that are not present is a no-op, not an error.
    async fn delete(&self, statements: &[Statement], graph: &GraphUri) -> Result<()>;

    /// Adds the given statements to the named graph.
    ///
    /// Inserting statements that are already present is a no-op.
    async fn insert(&self, statements: &[Statement], graph: &GraphUri) -> Result<()>;
}

/// In-memory graph store for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
/// Applies strict set semantics, mirroring the behavior the pipeline
/// expects from a real triple store.
#[derive(Debug, Default, Clone)]
pub struct MemoryGraphStore {
    graphs: Arc<RwLock<HashMap<GraphUri, HashSet<Statement>>>>,
}

impl MemoryGraphStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the named graph contains the statement.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn contains(&self, statement: &Statement, graph: &GraphUri) -> bool {
        self.graphs
            .read()
            .expect("graph store lock poisoned")
            .get(graph)
            .is_some_and(|g| g.contains(statement))
    }

    /// Returns the number of statements in the named graph.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn graph_len(&self, graph: &GraphUri) -> usize {
        self.graphs
            .read()
            .expect("graph store lock poisoned")
            .get(graph)
            .map_or(0, HashSet::len)
    }

    /// Returns a snapshot of the named graph's statements.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn graph_content(&self, graph: &GraphUri) -> HashSet<Statement> {
        self.graphs
            .read()
            .expect("graph store lock poisoned")
            .get(graph)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn delete(&self, statements: &[Statement], graph: &GraphUri) -> Result<()> {
        let mut graphs = self
            .graphs
            .write()
            .map_err(|_| Error::store("graph store lock poisoned"))?;
        if let Some(content) = graphs.get_mut(graph) {
            for statement in statements {
                content.remove(statement);
            }
        }
        Ok(())
    }

    async fn insert(&self, statements: &[Statement], graph: &GraphUri) -> Result<()> {
        let mut graphs = self
            .graphs
            .write()
            .map_err(|_| Error::store("graph store lock poisoned"))?;
        let content = graphs.entry(graph.clone()).or_default();
        for statement in statements {
            content.insert(statement.clone());
        }
        Ok(())
    }
}
