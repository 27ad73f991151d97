//! Error types for the consumption pipeline.
//!
//! The taxonomy mirrors the fatality rules of the pipeline: listing,
//! retrieval/decode, and store errors are all fatal for the run; only the
//! per-file format metadata lookup degrades gracefully (and therefore has
//! no variant here - it is logged, not raised).

/// The result type used throughout sylva-consumer.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while consuming deltas.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The delta file listing call failed. Fatal, aborts the run before
    /// any mutation.
    #[error("listing failed: {message}")]
    Listing {
        /// Description of the listing failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Downloading a delta file failed. Fatal for the run.
    #[error("download of delta file '{id}' failed: {message}")]
    FileDownload {
        /// Identifier of the delta file.
        id: String,
        /// Description of the download failure.
        message: String,
    },

    /// Decompressing a delta file failed. Fatal for the run.
    #[error("decompression of delta file '{id}' failed: {message}")]
    Decompress {
        /// Identifier of the delta file.
        id: String,
        /// Description of the decompression failure.
        message: String,
    },

    /// Decoding a delta file's change-sets failed. Fatal for the run.
    #[error("decode of delta file '{id}' failed: {message}")]
    Decode {
        /// Identifier of the delta file.
        id: String,
        /// Description of the decode failure.
        message: String,
    },

    /// The raw-file archival collaborator failed.
    #[error("archival of raw delta file failed: {message}")]
    Archive {
        /// Description of the archival failure.
        message: String,
    },

    /// The snapshot loader failed during a full sync.
    #[error("snapshot load failed: {message}")]
    Snapshot {
        /// Description of the snapshot failure.
        message: String,
    },

    /// The job/task persistence layer failed.
    #[error("task store error: {message}")]
    TaskStore {
        /// Description of the task store failure.
        message: String,
    },

    /// An invalid run state transition was attempted.
    #[error("invalid state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },

    /// An error from sylva-core (store mutations, configuration, terms).
    #[error("core error: {0}")]
    Core(#[from] sylva_core::Error),
}

impl Error {
    /// Creates a new listing error.
    #[must_use]
    pub fn listing(message: impl Into<String>) -> Self {
        Self::Listing {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new listing error with a source cause.
    #[must_use]
    pub fn listing_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Listing {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new task store error.
    #[must_use]
    pub fn task_store(message: impl Into<String>) -> Self {
        Self::TaskStore {
            message: message.into(),
        }
    }
}
