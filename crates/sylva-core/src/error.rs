//! Error types and result aliases for sylva.
//!
//! This module defines the shared error types used across all sylva
//! components. Errors are structured for programmatic handling and include
//! context for debugging.

use std::fmt;

/// The result type used throughout sylva.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sylva core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// Invalid input was provided (configuration values included).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A term could not be interpreted as a named node or literal.
    #[error("invalid term: {message}")]
    InvalidTerm {
        /// Description of the malformed term.
        message: String,
    },

    /// A graph store mutation was rejected.
    #[error("store error: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A local filesystem operation failed.
    #[error("io error: {message}")]
    Io {
        /// Description of the filesystem failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<std::io::Error>,
    },
}

impl Error {
    /// Creates a new store error with the given message.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new store error with a source cause.
    #[must_use]
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new io error wrapping a `std::io::Error`.
    #[must_use]
    pub fn io(message: impl fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            message: message.to_string(),
            source: Some(source),
        }
    }
}
