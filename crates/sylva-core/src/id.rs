//! Strongly-typed identifiers for sylva entities.
//!
//! All identifiers are:
//! - **Strongly typed**: Prevents mixing up different ID types at compile time
//! - **Lexicographically sortable**: ULIDs encode creation time and sort naturally
//! - **Globally unique**: No coordination required for generation
//!
//! # Example
//!
//! ```rust
//! use sylva_core::id::{ArtifactId, RunId};
//!
//! let run = RunId::generate();
//! let artifact = ArtifactId::generate();
//!
//! // IDs are different types - this won't compile:
//! // let wrong: RunId = artifact;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// A unique identifier for a consumption run.
///
/// Each externally triggered consumption attempt owns exactly one run ID,
/// recorded on result artifacts and log spans for traceability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Ulid);

impl RunId {
    /// Generates a new unique run ID.
    ///
    /// Uses ULID generation which is:
    /// - Lexicographically sortable by creation time
    /// - Globally unique without coordination
    /// - URL-safe and case-insensitive
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates a run ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid run ID '{s}': {e}"),
            })
    }
}

/// A unique identifier for a result artifact (raw delta file, audit file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Ulid);

impl ArtifactId {
    /// Generates a new unique artifact ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates an artifact ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid artifact ID '{s}': {e}"),
            })
    }
}
