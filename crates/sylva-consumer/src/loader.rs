//! Delta file retrieval and decoding.
//!
//! One delta file yields an ordered sequence of change-sets. The loader
//! retrieves the file content by its locator, stages the raw bytes in the
//! configured scratch directory, hands them to the optional archival
//! collaborator, decompresses when the format says so, and decodes the
//! records into the structured statement model.
//!
//! Any retrieval, decompression, or decode failure is fatal for the file
//! and therefore for the run: a file is applied atomically or not at all.
//! Skipping a bad file would silently desynchronize the cursor.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use serde::Deserialize;

use sylva_core::{ChangeSet, Config, Error as CoreError, Statement, Term};

use crate::catalog::DeltaFileDescriptor;
use crate::error::{Error, Result};
use crate::task::FileArtifact;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A raw delta file staged on local disk, before decoding.
#[derive(Debug, Clone)]
pub struct StagedDeltaFile {
    /// The descriptor the file was retrieved for.
    pub descriptor: DeltaFileDescriptor,
    /// Location of the raw content in the scratch directory.
    pub path: PathBuf,
}

/// Optional archival collaborator for raw delta files.
///
/// Invoked synchronously once the raw content is fully retrieved and before
/// it is discarded. The sink has no retry semantics of its own; its failure
/// propagates as a normal run-fatal error. A sink that archives the staged
/// file takes ownership of it - the loader then leaves the staged copy in
/// place.
#[async_trait]
pub trait RawFileSink: Send + Sync {
    /// Persists the staged raw file, returning the artifact to record on
    /// the owning task.
    async fn archive(&self, file: &StagedDeltaFile) -> Result<FileArtifact>;
}

/// The decoded outcome of loading one delta file.
#[derive(Debug)]
pub struct LoadedDeltaFile {
    /// Change-sets in consumption order.
    pub change_sets: Vec<ChangeSet>,
    /// Artifact produced by the archival sink, if one was supplied.
    pub artifact: Option<FileArtifact>,
}

#[derive(Debug, Deserialize)]
struct ChangeSetRecord {
    #[serde(default)]
    deletes: Vec<StatementRecord>,
    #[serde(default)]
    inserts: Vec<StatementRecord>,
}

#[derive(Debug, Deserialize)]
struct StatementRecord {
    subject: TermRecord,
    predicate: TermRecord,
    object: TermRecord,
}

#[derive(Debug, Deserialize)]
struct TermRecord {
    value: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    datatype: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

impl TermRecord {
    fn into_iri(self, position: &str) -> std::result::Result<String, String> {
        if self.kind == "uri" {
            Ok(self.value)
        } else {
            Err(format!(
                "{position} must be a uri term, got '{}'",
                self.kind
            ))
        }
    }

    fn into_term(self) -> std::result::Result<Term, String> {
        match self.kind.as_str() {
            "uri" => Ok(Term::named_node(self.value)),
            "literal" | "typed-literal" => Ok(Term::Literal {
                value: self.value,
                datatype: self.datatype,
                language: self.language,
            }),
            other => Err(format!("unknown term type '{other}'")),
        }
    }
}

impl StatementRecord {
    fn into_statement(self) -> std::result::Result<Statement, String> {
        Ok(Statement {
            subject: self.subject.into_iri("subject")?,
            predicate: self.predicate.into_iri("predicate")?,
            object: self.object.into_term()?,
        })
    }
}

/// Retrieves and decodes one delta file at a time.
#[derive(Debug, Clone)]
pub struct DeltaFileLoader {
    config: Config,
    client: reqwest::Client,
}

impl DeltaFileLoader {
    /// Creates a loader for the configured endpoints and scratch directory.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    /// Loads one delta file: download, stage, archive, decode.
    ///
    /// Statement order inside each record and record order inside the file
    /// are preserved in the returned sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileDownload`], [`Error::Decompress`] or
    /// [`Error::Decode`] on failure; all are fatal for the run. A failing
    /// sink propagates as-is.
    pub async fn load(
        &self,
        descriptor: &DeltaFileDescriptor,
        sink: Option<&dyn RawFileSink>,
    ) -> Result<LoadedDeltaFile> {
        let bytes = self.download(descriptor).await?;
        let staged = self.stage(descriptor, &bytes).await?;

        let artifact = match sink {
            Some(sink) => Some(sink.archive(&staged).await?),
            None => None,
        };

        let change_sets = Self::decode(descriptor, &bytes)?;

        if artifact.is_none() {
            // Nothing took ownership of the staged copy.
            if let Err(e) = tokio::fs::remove_file(&staged.path).await {
                tracing::warn!(path = %staged.path.display(), error = %e, "failed to remove staged delta file");
            }
        }

        tracing::info!(
            file_id = %descriptor.id,
            change_sets = change_sets.len(),
            "loaded delta file"
        );

        Ok(LoadedDeltaFile {
            change_sets,
            artifact,
        })
    }

    async fn download(&self, descriptor: &DeltaFileDescriptor) -> Result<Bytes> {
        let url = self.config.download_url(&descriptor.id);
        tracing::debug!(%url, file_id = %descriptor.id, "downloading delta file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::FileDownload {
                id: descriptor.id.clone(),
                message: format!("request to {url} failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FileDownload {
                id: descriptor.id.clone(),
                message: format!("{url} returned {status}"),
            });
        }

        response.bytes().await.map_err(|e| Error::FileDownload {
            id: descriptor.id.clone(),
            message: format!("reading body from {url} failed: {e}"),
        })
    }

    async fn stage(
        &self,
        descriptor: &DeltaFileDescriptor,
        bytes: &Bytes,
    ) -> Result<StagedDeltaFile> {
        let scratch = self.config.scratch_dir();
        tokio::fs::create_dir_all(scratch)
            .await
            .map_err(|e| CoreError::io(format!("creating {}", scratch.display()), e))?;

        let path = scratch.join(sanitize_file_name(&descriptor.name, &descriptor.id));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CoreError::io(format!("staging {}", path.display()), e))?;

        Ok(StagedDeltaFile {
            descriptor: descriptor.clone(),
            path,
        })
    }

    fn decode(descriptor: &DeltaFileDescriptor, bytes: &[u8]) -> Result<Vec<ChangeSet>> {
        let mut decompressed = Vec::new();
        let content: &[u8] = if descriptor.format.is_compressed() {
            GzDecoder::new(bytes)
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::Decompress {
                    id: descriptor.id.clone(),
                    message: e.to_string(),
                })?;
            &decompressed
        } else {
            bytes
        };

        let records: Vec<ChangeSetRecord> =
            serde_json::from_slice(content).map_err(|e| Error::Decode {
                id: descriptor.id.clone(),
                message: e.to_string(),
            })?;

        records
            .into_iter()
            .map(|record| {
                let deletions = record
                    .deletes
                    .into_iter()
                    .map(StatementRecord::into_statement)
                    .collect::<std::result::Result<Vec<_>, _>>();
                let insertions = record
                    .inserts
                    .into_iter()
                    .map(StatementRecord::into_statement)
                    .collect::<std::result::Result<Vec<_>, _>>();
                match (deletions, insertions) {
                    (Ok(deletions), Ok(insertions)) => Ok(ChangeSet::new(deletions, insertions)),
                    (Err(message), _) | (_, Err(message)) => Err(Error::Decode {
                        id: descriptor.id.clone(),
                        message,
                    }),
                }
            })
            .collect()
    }
}

/// Keeps only a safe file name component, falling back to the file id.
fn sanitize_file_name(name: &str, id: &str) -> String {
    let candidate = name.replace(['/', '\\'], "_");
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        format!("{id}.json")
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileFormat;
    use chrono::Utc;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn descriptor(format: FileFormat) -> DeltaFileDescriptor {
        DeltaFileDescriptor {
            id: "file-1".to_string(),
            name: "deltas-1.json".to_string(),
            created: Utc::now(),
            format,
        }
    }

    fn sample_body() -> Vec<u8> {
        serde_json::json!([
            {
                "deletes": [],
                "inserts": [
                    {
                        "subject": { "value": "http://example.org/s1", "type": "uri" },
                        "predicate": { "value": "http://example.org/p1", "type": "uri" },
                        "object": { "value": "http://example.org/o1", "type": "uri" }
                    }
                ]
            },
            {
                "deletes": [
                    {
                        "subject": { "value": "http://example.org/s1", "type": "uri" },
                        "predicate": { "value": "http://example.org/p1", "type": "uri" },
                        "object": { "value": "http://example.org/o1", "type": "uri" }
                    }
                ],
                "inserts": [
                    {
                        "subject": { "value": "http://example.org/s2", "type": "uri" },
                        "predicate": { "value": "http://example.org/p2", "type": "uri" },
                        "object": { "value": "42", "type": "typed-literal",
                                    "datatype": "http://www.w3.org/2001/XMLSchema#integer" }
                    }
                ]
            }
        ])
        .to_string()
        .into_bytes()
    }

    #[test]
    fn decode_preserves_record_order() {
        let change_sets =
            DeltaFileLoader::decode(&descriptor(FileFormat::Json), &sample_body()).expect("decode");

        assert_eq!(change_sets.len(), 2);
        assert!(change_sets[0].deletions.is_empty());
        assert_eq!(change_sets[0].insertions[0].subject, "http://example.org/s1");
        assert_eq!(change_sets[1].deletions[0].subject, "http://example.org/s1");
        assert_eq!(
            change_sets[1].insertions[0].object,
            Term::typed_literal("42", "http://www.w3.org/2001/XMLSchema#integer")
        );
    }

    #[test]
    fn decode_handles_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&sample_body()).expect("compress");
        let compressed = encoder.finish().expect("finish");

        let change_sets =
            DeltaFileLoader::decode(&descriptor(FileFormat::GzippedJson), &compressed)
                .expect("decode");
        assert_eq!(change_sets.len(), 2);
    }

    #[test]
    fn corrupt_gzip_is_a_decompress_error() {
        let err = DeltaFileLoader::decode(&descriptor(FileFormat::GzippedJson), b"not gzip")
            .unwrap_err();
        assert!(matches!(err, Error::Decompress { .. }));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err =
            DeltaFileLoader::decode(&descriptor(FileFormat::Json), b"{not json").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn literal_subject_is_rejected() {
        let body = serde_json::json!([
            {
                "inserts": [
                    {
                        "subject": { "value": "oops", "type": "literal" },
                        "predicate": { "value": "http://example.org/p", "type": "uri" },
                        "object": { "value": "v", "type": "literal" }
                    }
                ]
            }
        ])
        .to_string();

        let err =
            DeltaFileLoader::decode(&descriptor(FileFormat::Json), body.as_bytes()).unwrap_err();
        let Error::Decode { message, .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains("subject"));
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("a.json", "id"), "a.json");
        assert_eq!(sanitize_file_name("../a.json", "id"), ".._a.json");
        assert_eq!(sanitize_file_name("", "id"), "id.json");
    }
}
