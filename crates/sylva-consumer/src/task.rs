//! Job/task system boundary.
//!
//! The job/task persistence layer is an external collaborator: runs are
//! created when triggered externally, and this module only defines the
//! interface the pipeline consumes, plus an in-memory implementation used
//! by tests. Scheduling precedes triggering, so the pipeline never sets the
//! `Scheduled` status itself.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sylva_core::{ArtifactId, GraphUri};

use crate::error::{Error, Result};
use crate::run::RunState;

/// The external event that triggered a consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    /// Subject URI of the delta entry that fired the trigger.
    pub subject: String,
}

impl TriggerEvent {
    /// Creates a trigger event for the given subject.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// The declared type of a triggered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Bootstrap the target graph from the latest full snapshot.
    FullSync,
    /// Consume delta files published after the resume cursor.
    DeltaSync,
}

/// A triggered task owning exactly one consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// URI of the task in the job system.
    pub uri: String,
    /// Declared task type; selects the full-sync or delta-sync branch.
    pub task_type: TaskType,
}

impl Task {
    /// Creates a task.
    #[must_use]
    pub fn new(uri: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            uri: uri.into(),
            task_type,
        }
    }
}

/// A container grouping result artifacts attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultContainer {
    /// Container identifier.
    pub id: Uuid,
    /// Container URI in the job system.
    pub uri: String,
}

impl ResultContainer {
    /// Generates a new container with a derived URI.
    #[must_use]
    pub fn generate() -> Self {
        let id = Uuid::new_v4();
        Self {
            uri: format!("http://data.sylva.dev/id/data-containers/{id}"),
            id,
        }
    }
}

/// A file artifact produced by a run (raw delta file, audit subject list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileArtifact {
    /// Artifact identifier.
    pub id: ArtifactId,
    /// File name.
    pub name: String,
    /// Local path of the file content.
    pub path: PathBuf,
    /// Media type of the content.
    pub media_type: String,
}

/// Interface of the job/task persistence layer.
///
/// Status values the pipeline writes are `Busy`, `Succeeded` and `Failed`;
/// `Scheduled` is set by whatever schedules the task, before triggering.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Loads the task that triggered the given event, if any.
    ///
    /// An absent task is not an error: the trigger is simply ignored.
    async fn load_triggering_task(&self, event: &TriggerEvent) -> Result<Option<Task>>;

    /// Records a status transition on the task.
    async fn set_status(&self, task: &Task, status: RunState) -> Result<()>;

    /// Records an error message on the task.
    async fn record_error(&self, task: &Task, message: &str) -> Result<()>;

    /// Attaches a result file to the task under the given container.
    async fn attach_result_file(
        &self,
        task: &Task,
        container: &ResultContainer,
        file: &FileArtifact,
    ) -> Result<()>;

    /// Attaches a result graph to the task under the given container.
    async fn attach_result_graph(
        &self,
        task: &Task,
        container: &ResultContainer,
        graph: &GraphUri,
    ) -> Result<()>;

    /// Returns the modification timestamp of the most recent successfully
    /// completed delta-sync run, if any.
    ///
    /// This is the history half of cursor resolution; a query failure here
    /// is fatal for the run and must propagate.
    async fn latest_delta_success(&self) -> Result<Option<DateTime<Utc>>>;
}

#[derive(Debug, Clone)]
struct TaskRecord {
    task: Task,
    status: Option<RunState>,
    errors: Vec<String>,
    result_files: Vec<(ResultContainer, FileArtifact)>,
    result_graphs: Vec<(ResultContainer, GraphUri)>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<String, TaskRecord>,
    latest_delta_success: Option<DateTime<Utc>>,
}

/// In-memory task store for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Mirrors the job
/// system's observable behavior: a successful delta-sync run advances the
/// recorded cursor to the task's modification time.
#[derive(Debug, Default, Clone)]
pub struct MemoryTaskStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryTaskStore {
    /// Creates a new empty task store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task as the one triggered by the given event subject.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register(&self, trigger_subject: impl Into<String>, task: Task) {
        let mut inner = self.inner.write().expect("task store lock poisoned");
        inner.tasks.insert(
            trigger_subject.into(),
            TaskRecord {
                task,
                status: None,
                errors: Vec::new(),
                result_files: Vec::new(),
                result_graphs: Vec::new(),
                modified: Utc::now(),
            },
        );
    }

    /// Seeds the recorded cursor, simulating a prior successful run.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn seed_latest_delta_success(&self, timestamp: DateTime<Utc>) {
        self.inner
            .write()
            .expect("task store lock poisoned")
            .latest_delta_success = Some(timestamp);
    }

    /// Returns the recorded status of the task with the given URI.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn status_of(&self, task_uri: &str) -> Option<RunState> {
        self.record_of(task_uri).and_then(|r| r.status)
    }

    /// Returns the error messages recorded on the task.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn errors_of(&self, task_uri: &str) -> Vec<String> {
        self.record_of(task_uri).map_or_else(Vec::new, |r| r.errors)
    }

    /// Returns the graphs attached to the task as results.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn result_graphs_of(&self, task_uri: &str) -> Vec<GraphUri> {
        self.record_of(task_uri).map_or_else(Vec::new, |r| {
            r.result_graphs.into_iter().map(|(_, g)| g).collect()
        })
    }

    /// Returns the file artifacts attached to the task as results.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn result_files_of(&self, task_uri: &str) -> Vec<FileArtifact> {
        self.record_of(task_uri).map_or_else(Vec::new, |r| {
            r.result_files.into_iter().map(|(_, f)| f).collect()
        })
    }

    fn record_of(&self, task_uri: &str) -> Option<TaskRecord> {
        self.inner
            .read()
            .expect("task store lock poisoned")
            .tasks
            .values()
            .find(|r| r.task.uri == task_uri)
            .cloned()
    }

    fn with_record<F>(&self, task_uri: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::task_store("task store lock poisoned"))?;
        let record = inner
            .tasks
            .values_mut()
            .find(|r| r.task.uri == task_uri)
            .ok_or_else(|| Error::task_store(format!("unknown task: {task_uri}")))?;
        f(record);
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn load_triggering_task(&self, event: &TriggerEvent) -> Result<Option<Task>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::task_store("task store lock poisoned"))?;
        Ok(inner.tasks.get(&event.subject).map(|r| r.task.clone()))
    }

    async fn set_status(&self, task: &Task, status: RunState) -> Result<()> {
        let now = Utc::now();
        self.with_record(&task.uri, |record| {
            record.status = Some(status);
            record.modified = now;
        })?;
        // A successful delta-sync run is what advances the durable cursor.
        if status == RunState::Succeeded && task.task_type == TaskType::DeltaSync {
            self.inner
                .write()
                .map_err(|_| Error::task_store("task store lock poisoned"))?
                .latest_delta_success = Some(now);
        }
        Ok(())
    }

    async fn record_error(&self, task: &Task, message: &str) -> Result<()> {
        let message = message.to_string();
        self.with_record(&task.uri, |record| record.errors.push(message))
    }

    async fn attach_result_file(
        &self,
        task: &Task,
        container: &ResultContainer,
        file: &FileArtifact,
    ) -> Result<()> {
        let attachment = (container.clone(), file.clone());
        self.with_record(&task.uri, |record| record.result_files.push(attachment))
    }

    async fn attach_result_graph(
        &self,
        task: &Task,
        container: &ResultContainer,
        graph: &GraphUri,
    ) -> Result<()> {
        let attachment = (container.clone(), graph.clone());
        self.with_record(&task.uri, |record| record.result_graphs.push(attachment))
    }

    async fn latest_delta_success(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .inner
            .read()
            .map_err(|_| Error::task_store("task store lock poisoned"))?
            .latest_delta_success)
    }
}
