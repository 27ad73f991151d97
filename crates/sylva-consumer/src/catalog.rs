//! Delta file catalog.
//!
//! Lists the delta files the upstream publisher has produced after a given
//! cursor, each annotated with its encoding format. The listing call is
//! fatal on failure; the per-file format metadata lookup is advisory and
//! degrades to the default format, never dropping the file.
//!
//! The returned sequence is ordered by creation time ascending. Consumers
//! must not re-sort or parallelize application across files: a later file's
//! deletion can target a statement inserted by an earlier file.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sylva_core::Config;

use crate::error::{Error, Result};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const JSON_API_ACCEPT: &str = "application/vnd.api+json";

/// Encoding format of a delta file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileFormat {
    /// Plain JSON change-set records. The default, always a valid fallback.
    #[default]
    Json,
    /// Gzip-compressed JSON change-set records.
    GzippedJson,
}

impl FileFormat {
    /// Maps an upstream media type to a format.
    ///
    /// Unknown media types map to the default format rather than failing:
    /// format metadata is advisory.
    #[must_use]
    pub fn from_media_type(media_type: &str) -> Self {
        match media_type.trim() {
            "application/gzip" | "application/x-gzip" => Self::GzippedJson,
            _ => Self::Json,
        }
    }

    /// Returns the media type of the format.
    #[must_use]
    pub const fn media_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::GzippedJson => "application/gzip",
        }
    }

    /// Returns true when the content must be decompressed before decoding.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        matches!(self, Self::GzippedJson)
    }
}

/// A delta file as announced by the catalog.
///
/// Created by the listing, consumed once per successful run, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaFileDescriptor {
    /// Upstream identifier; also the content-retrieval locator via the
    /// configured download endpoint.
    pub id: String,
    /// File name, used for scratch staging and archival.
    pub name: String,
    /// Publication timestamp; the ascending sort key of a run.
    pub created: DateTime<Utc>,
    /// Encoding format.
    pub format: FileFormat,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    data: Vec<ListedFile>,
}

#[derive(Debug, Deserialize)]
struct ListedFile {
    id: String,
    attributes: ListedFileAttributes,
}

#[derive(Debug, Deserialize)]
struct ListedFileAttributes {
    #[serde(default)]
    name: Option<String>,
    created: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FileMetadataResponse {
    data: FileMetadataData,
}

#[derive(Debug, Deserialize)]
struct FileMetadataData {
    attributes: FileMetadataAttributes,
}

#[derive(Debug, Deserialize)]
struct FileMetadataAttributes {
    #[serde(default)]
    format: Option<String>,
}

/// Client for the remote delta-listing service.
#[derive(Debug, Clone)]
pub struct DeltaCatalog {
    config: Config,
    client: reqwest::Client,
}

impl DeltaCatalog {
    /// Creates a catalog client for the configured endpoints.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    /// Lists the delta files published strictly after `since`, ordered by
    /// creation time ascending.
    ///
    /// Per-file format metadata is fetched concurrently from the secondary
    /// endpoint; a failing lookup degrades that file to the default format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listing`] when the primary listing call fails or
    /// its payload cannot be decoded. Aborts the run before any mutation.
    pub async fn list(&self, since: DateTime<Utc>) -> Result<Vec<DeltaFileDescriptor>> {
        let url = self.config.files_url();
        tracing::debug!(%url, since = %since.to_rfc3339(), "listing unconsumed delta files");

        let response = self
            .client
            .get(&url)
            .query(&[("since", since.to_rfc3339())])
            .header(reqwest::header::ACCEPT, JSON_API_ACCEPT)
            .send()
            .await
            .map_err(|e| Error::listing_with_source(format!("request to {url} failed"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::listing(format!("{url} returned {status}")));
        }

        let listing = response
            .json::<ListingResponse>()
            .await
            .map_err(|e| Error::listing_with_source("malformed listing payload", e))?;

        let lookups = listing.data.into_iter().map(|file| async move {
            let format = self.lookup_format(&file.id).await;
            DeltaFileDescriptor {
                name: file
                    .attributes
                    .name
                    .unwrap_or_else(|| format!("{}.json", file.id)),
                created: file.attributes.created,
                format,
                id: file.id,
            }
        });
        let mut files = futures::future::join_all(lookups).await;

        // Ordering across files is part of correctness, not presentation.
        files.sort_by_key(|f| f.created);

        tracing::info!(count = files.len(), "listed unconsumed delta files");
        Ok(files)
    }

    /// Fetches the advisory format metadata for one file.
    ///
    /// Never fails: an unreachable endpoint or malformed payload degrades
    /// to the default format.
    async fn lookup_format(&self, id: &str) -> FileFormat {
        let url = self.config.file_metadata_url(id);
        let media_type = async {
            let response = self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, JSON_API_ACCEPT)
                .send()
                .await
                .ok()?
                .error_for_status()
                .ok()?;
            response
                .json::<FileMetadataResponse>()
                .await
                .ok()?
                .data
                .attributes
                .format
        }
        .await;

        match media_type {
            Some(media_type) => FileFormat::from_media_type(&media_type),
            None => {
                tracing::warn!(file_id = id, "file metadata unavailable, using default format");
                FileFormat::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn media_types_map_to_formats() {
        assert_eq!(
            FileFormat::from_media_type("application/gzip"),
            FileFormat::GzippedJson
        );
        assert_eq!(
            FileFormat::from_media_type("application/x-gzip"),
            FileFormat::GzippedJson
        );
        assert_eq!(
            FileFormat::from_media_type("application/json"),
            FileFormat::Json
        );
        // Advisory metadata: unknown types fall back instead of failing.
        assert_eq!(
            FileFormat::from_media_type("application/octet-stream"),
            FileFormat::Json
        );
    }

    #[test]
    fn listing_payload_decodes_json_api_shape() {
        let payload = serde_json::json!({
            "data": [
                {
                    "id": "file-1",
                    "attributes": { "name": "deltas-1.json", "created": "2024-02-01T00:00:00Z" }
                },
                {
                    "id": "file-2",
                    "attributes": { "created": "2024-01-01T00:00:00Z" }
                }
            ]
        });

        let listing: ListingResponse = serde_json::from_value(payload).expect("decode");
        assert_eq!(listing.data.len(), 2);
        assert_eq!(listing.data[0].id, "file-1");
        assert!(listing.data[1].attributes.name.is_none());
        assert_eq!(
            listing.data[1].attributes.created,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
