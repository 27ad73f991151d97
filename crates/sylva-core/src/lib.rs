//! # sylva-core
//!
//! Core abstractions for the sylva delta-consumption pipeline.
//!
//! This crate provides the foundational types shared by all sylva components:
//!
//! - **Statement Model**: RDF-style terms, statements, and change-sets
//! - **Graph Store Contract**: Named-graph delete/insert abstraction
//! - **Identifiers**: Strongly-typed IDs for runs and artifacts
//! - **Configuration**: Environment-driven, immutable, built once at startup
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `sylva-core` is the only crate allowed to define shared primitives.
//! The consumer pipeline (`sylva-consumer`) builds on these contracts and
//! never reaches around them.
//!
//! ## Example
//!
//! ```rust
//! use sylva_core::prelude::*;
//!
//! let graph = GraphUri::new("http://example.org/graphs/landing");
//! let statement = Statement::new(
//!     "http://example.org/s1",
//!     "http://example.org/p1",
//!     Term::named_node("http://example.org/o1"),
//! );
//! assert_eq!(statement.subject, "http://example.org/s1");
//! # let _ = graph;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod observability;
pub mod statement;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use sylva_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::graph::{GraphStore, GraphUri, MemoryGraphStore};
    pub use crate::id::{ArtifactId, RunId};
    pub use crate::statement::{ChangeSet, Statement, Term};
}

// Re-export key types at crate root for ergonomics
pub use config::Config;
pub use error::{Error, Result};
pub use graph::{GraphStore, GraphUri, MemoryGraphStore};
pub use id::{ArtifactId, RunId};
pub use statement::{ChangeSet, Statement, Term};
