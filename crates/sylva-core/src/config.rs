//! Consumer configuration.
//!
//! One immutable [`Config`] value is constructed at process start (normally
//! via [`Config::from_env`]) and passed explicitly into each component
//! constructor. There is no ambient global configuration state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::GraphUri;

/// Placeholder substituted with the delta file id in endpoint paths.
const ID_PLACEHOLDER: &str = "{id}";

fn default_sync_files_path() -> String {
    "/sync/files".to_string()
}

fn default_file_metadata_path() -> String {
    "/files/{id}".to_string()
}

fn default_download_file_path() -> String {
    "/files/{id}/download".to_string()
}

fn default_landing_graph() -> GraphUri {
    GraphUri::new("http://data.sylva.dev/graphs/landing")
}

fn default_batch_size() -> usize {
    100
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

/// Configuration for the sylva consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the upstream publishing service.
    pub sync_base_url: String,

    /// Path of the delta file listing endpoint, relative to the base URL.
    #[serde(default = "default_sync_files_path")]
    pub sync_files_path: String,

    /// Path of the per-file metadata endpoint. Must contain `{id}`.
    #[serde(default = "default_file_metadata_path")]
    pub file_metadata_path: String,

    /// Path of the file download endpoint. Must contain `{id}`.
    #[serde(default = "default_download_file_path")]
    pub download_file_path: String,

    /// SPARQL update endpoint of the target store, when the HTTP store
    /// client is used. Test setups with an in-memory store leave this unset.
    #[serde(default)]
    pub store_endpoint: Option<String>,

    /// Default landing graph receiving applied statements.
    #[serde(default = "default_landing_graph")]
    pub landing_graph: GraphUri,

    /// Number of statements per store mutation call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Optional operator-supplied resume-point override.
    ///
    /// Wins over the recorded history cursor only when it is more recent;
    /// an older override is ignored to avoid re-applying applied data.
    #[serde(default)]
    pub start_from_timestamp: Option<DateTime<Utc>>,

    /// Local directory for transient file staging and audit files.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Config {
    /// Creates a configuration with defaults for the given base URL.
    #[must_use]
    pub fn new(sync_base_url: impl Into<String>) -> Self {
        Self {
            sync_base_url: sync_base_url.into(),
            sync_files_path: default_sync_files_path(),
            file_metadata_path: default_file_metadata_path(),
            download_file_path: default_download_file_path(),
            store_endpoint: None,
            landing_graph: default_landing_graph(),
            batch_size: default_batch_size(),
            start_from_timestamp: None,
            scratch_dir: default_scratch_dir(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `SYLVA_SYNC_BASE_URL` (required)
    /// - `SYLVA_SYNC_FILES_PATH`
    /// - `SYLVA_FILE_METADATA_PATH`
    /// - `SYLVA_DOWNLOAD_FILE_PATH`
    /// - `SYLVA_STORE_ENDPOINT`
    /// - `SYLVA_LANDING_GRAPH`
    /// - `SYLVA_BATCH_SIZE`
    /// - `SYLVA_START_FROM_TIMESTAMP` (RFC3339, e.g. "2024-01-01T00:00:00Z")
    /// - `SYLVA_SCRATCH_DIR`
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is absent, or if any variable
    /// is present but cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let sync_base_url = env_string("SYLVA_SYNC_BASE_URL").ok_or_else(|| {
            Error::InvalidInput("SYLVA_SYNC_BASE_URL is required".to_string())
        })?;

        let mut config = Self::new(sync_base_url);

        if let Some(path) = env_string("SYLVA_SYNC_FILES_PATH") {
            config.sync_files_path = path;
        }
        if let Some(path) = env_string("SYLVA_FILE_METADATA_PATH") {
            config.file_metadata_path = path;
        }
        if let Some(path) = env_string("SYLVA_DOWNLOAD_FILE_PATH") {
            config.download_file_path = path;
        }
        config.store_endpoint = env_string("SYLVA_STORE_ENDPOINT");
        if let Some(graph) = env_string("SYLVA_LANDING_GRAPH") {
            config.landing_graph = GraphUri::new(graph);
        }
        if let Some(batch_size) = env_usize("SYLVA_BATCH_SIZE")? {
            config.batch_size = batch_size;
        }
        if let Some(timestamp) = env_datetime("SYLVA_START_FROM_TIMESTAMP")? {
            config.start_from_timestamp = Some(timestamp);
        }
        if let Some(dir) = env_string("SYLVA_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending setting when validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.sync_base_url.trim().is_empty() {
            return Err(Error::InvalidInput(
                "SYLVA_SYNC_BASE_URL must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidInput(
                "SYLVA_BATCH_SIZE must be greater than 0".to_string(),
            ));
        }
        for (name, path) in [
            ("SYLVA_SYNC_FILES_PATH", &self.sync_files_path),
            ("SYLVA_FILE_METADATA_PATH", &self.file_metadata_path),
            ("SYLVA_DOWNLOAD_FILE_PATH", &self.download_file_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::InvalidInput(format!("{name} must start with '/'")));
            }
        }
        for (name, path) in [
            ("SYLVA_FILE_METADATA_PATH", &self.file_metadata_path),
            ("SYLVA_DOWNLOAD_FILE_PATH", &self.download_file_path),
        ] {
            if !path.contains(ID_PLACEHOLDER) {
                return Err(Error::InvalidInput(format!(
                    "{name} must contain the '{ID_PLACEHOLDER}' placeholder"
                )));
            }
        }
        Ok(())
    }

    /// Returns the full URL of the delta file listing endpoint.
    #[must_use]
    pub fn files_url(&self) -> String {
        format!("{}{}", self.base_url_trimmed(), self.sync_files_path)
    }

    /// Returns the full metadata URL for the given file id.
    #[must_use]
    pub fn file_metadata_url(&self, id: &str) -> String {
        format!(
            "{}{}",
            self.base_url_trimmed(),
            self.file_metadata_path.replace(ID_PLACEHOLDER, id)
        )
    }

    /// Returns the full download URL for the given file id.
    #[must_use]
    pub fn download_url(&self, id: &str) -> String {
        format!(
            "{}{}",
            self.base_url_trimmed(),
            self.download_file_path.replace(ID_PLACEHOLDER, id)
        )
    }

    /// Returns the scratch directory as a path.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    fn base_url_trimmed(&self) -> &str {
        self.sync_base_url.trim_end_matches('/')
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<usize>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a usize: {e}")))
}

fn env_datetime(name: &str) -> Result<Option<DateTime<Utc>>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(&v).map_err(|e| {
        Error::InvalidInput(format!(
            "{name} must be RFC3339 (e.g. 2024-01-01T00:00:00Z): {e}"
        ))
    })?;
    Ok(Some(parsed.with_timezone(&Utc)))
}
