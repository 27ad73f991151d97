//! Resume-point (cursor) resolution.
//!
//! The cursor marks the boundary between already-consumed and
//! not-yet-consumed changes: "consume everything published strictly after
//! this point". It is only ever advanced by successfully completed runs, so
//! an aborted run leaves the resume point unchanged.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::task::TaskStore;

/// Decides the cursor from which to resume consumption.
///
/// Two candidates are considered: an optionally configured override and the
/// modification timestamp of the most recent successfully completed
/// delta-sync run in the job history. The later of the two wins when both
/// exist - an override older than the known safe point is ignored, so
/// already-applied data is never re-applied. With no candidate at all,
/// consumption starts tracking from now.
#[derive(Debug, Clone, Copy)]
pub struct TimestampResolver {
    override_timestamp: Option<DateTime<Utc>>,
}

impl TimestampResolver {
    /// Creates a resolver with the configured override, if any.
    #[must_use]
    pub fn new(override_timestamp: Option<DateTime<Utc>>) -> Self {
        Self { override_timestamp }
    }

    /// Resolves the cursor.
    ///
    /// # Errors
    ///
    /// Propagates a failing history query; a broken job history must fail
    /// the run rather than silently defaulting.
    pub async fn resolve(&self, task_store: &dyn TaskStore) -> Result<DateTime<Utc>> {
        let history = task_store.latest_delta_success().await?;

        let cursor = match (self.override_timestamp, history) {
            (Some(configured), Some(recorded)) => {
                if configured > recorded {
                    tracing::info!(
                        %configured,
                        %recorded,
                        "configured resume point is more recent than job history, using it"
                    );
                    configured
                } else {
                    recorded
                }
            }
            (None, Some(recorded)) => recorded,
            (Some(configured), None) => {
                tracing::info!(%configured, "no job history, using configured resume point");
                configured
            }
            (None, None) => {
                let now = Utc::now();
                tracing::info!(%now, "no resume point found, starting to track from now");
                now
            }
        };

        Ok(cursor)
    }
}
