//! Consumption run orchestration.
//!
//! One externally triggered event owns exactly one consumption attempt:
//! `Scheduled -> Busy -> {Success, Failed}`, terminal either way, no
//! internal retry. The orchestrator is the only component with side
//! effects on run/job state.
//!
//! The original service grew several near-identical pipeline variants
//! differing only in which graphs received writes and whether an audit
//! file was produced; here a single orchestrator is parameterized by
//! [`WriteTargets`] and [`RunOptions::emit_audit_file`] instead.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument as _;

use sylva_core::observability::{file_span, run_span};
use sylva_core::{ArtifactId, Config, Error as CoreError, GraphStore, GraphUri, RunId};

use crate::applier::ChangeSetApplier;
use crate::catalog::DeltaCatalog;
use crate::error::{Error, Result};
use crate::loader::{DeltaFileLoader, RawFileSink};
use crate::resolver::TimestampResolver;
use crate::snapshot::SnapshotLoader;
use crate::task::{FileArtifact, ResultContainer, Task, TaskStore, TaskType, TriggerEvent};

/// Run state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Created by the scheduler, waiting to be triggered.
    Scheduled,
    /// Actively consuming; set before any store mutation begins.
    Busy,
    /// The task-type branch completed and results were recorded.
    Succeeded,
    /// An error occurred after entering `Busy`; message captured.
    Failed,
}

impl RunState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the transition from self to target is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Scheduled => matches!(target, Self::Busy),
            Self::Busy => matches!(target, Self::Succeeded | Self::Failed),
            Self::Succeeded | Self::Failed => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "SCHEDULED"),
            Self::Busy => write!(f, "BUSY"),
            Self::Succeeded => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Which graph(s) receive applied statements, and which one is recorded as
/// the run's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "variant")]
pub enum WriteTargets {
    /// Apply everything to one landing graph; record it as the result.
    SingleGraph {
        /// The landing graph.
        landing: GraphUri,
    },
    /// Additionally stage writes into a run-scoped ephemeral graph that is
    /// exposed as the run's result artifact.
    WithEphemeralResult {
        /// The landing graph.
        landing: GraphUri,
        /// The run-scoped result graph.
        result: GraphUri,
    },
}

impl WriteTargets {
    /// Returns every graph that receives applied statements.
    #[must_use]
    pub fn graphs(&self) -> Vec<GraphUri> {
        match self {
            Self::SingleGraph { landing } => vec![landing.clone()],
            Self::WithEphemeralResult { landing, result } => {
                vec![landing.clone(), result.clone()]
            }
        }
    }

    /// Returns the one graph recorded as the run's result.
    #[must_use]
    pub const fn result_graph(&self) -> &GraphUri {
        match self {
            Self::SingleGraph { landing } => landing,
            Self::WithEphemeralResult { result, .. } => result,
        }
    }
}

/// Variant selection for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Target graph selection.
    pub targets: WriteTargets,
    /// Whether to write and attach the audit subject file.
    pub emit_audit_file: bool,
}

impl RunOptions {
    /// Single landing graph, no audit file.
    #[must_use]
    pub const fn single_graph(landing: GraphUri) -> Self {
        Self {
            targets: WriteTargets::SingleGraph { landing },
            emit_audit_file: false,
        }
    }

    /// Landing graph plus a run-scoped ephemeral result graph.
    #[must_use]
    pub const fn with_ephemeral_result(landing: GraphUri, result: GraphUri) -> Self {
        Self {
            targets: WriteTargets::WithEphemeralResult { landing, result },
            emit_audit_file: false,
        }
    }

    /// Also emit the audit subject file as a result artifact.
    #[must_use]
    pub const fn with_audit_file(mut self) -> Self {
        self.emit_audit_file = true;
        self
    }
}

/// The observable outcome of one consumption attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: RunId,
    /// URI of the triggering task.
    pub task_uri: String,
    /// Current state of the run.
    pub state: RunState,
    /// When the run entered `Busy`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// The resolved cursor the run consumed from (delta-sync only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<DateTime<Utc>>,
    /// Identifiers of the delta files consumed, in application order.
    pub files_consumed: Vec<String>,
    /// Distinct subjects touched by insertions across the run.
    pub audit_subjects: HashSet<String>,
    /// Error message, when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    fn new(run_id: RunId, task: &Task) -> Self {
        Self {
            run_id,
            task_uri: task.uri.clone(),
            state: RunState::Scheduled,
            started_at: None,
            completed_at: None,
            cursor: None,
            files_consumed: Vec::new(),
            audit_subjects: HashSet::new(),
            error: None,
        }
    }

    /// Transitions to a new state.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is invalid.
    #[tracing::instrument(skip(self), fields(run_id = %self.run_id, from = %self.state, to = %target))]
    pub fn transition_to(&mut self, target: RunState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
                reason: "invalid run state transition".to_string(),
            });
        }

        let now = Utc::now();
        match target {
            RunState::Busy => self.started_at = Some(now),
            RunState::Succeeded | RunState::Failed => self.completed_at = Some(now),
            RunState::Scheduled => {}
        }

        self.state = target;
        Ok(())
    }
}

/// Orchestrates one consumption attempt end to end.
///
/// Control flow within a run is strictly sequential; files are processed
/// one at a time in catalog order because statement ordering across files
/// is a correctness requirement, not a performance choice.
pub struct ConsumptionRun<'a> {
    config: Config,
    task_store: &'a dyn TaskStore,
    graph_store: &'a dyn GraphStore,
    snapshot_loader: &'a dyn SnapshotLoader,
    sink: Option<&'a dyn RawFileSink>,
    options: RunOptions,
}

impl<'a> ConsumptionRun<'a> {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        task_store: &'a dyn TaskStore,
        graph_store: &'a dyn GraphStore,
        snapshot_loader: &'a dyn SnapshotLoader,
        options: RunOptions,
    ) -> Self {
        Self {
            config,
            task_store,
            graph_store,
            snapshot_loader,
            sink: None,
            options,
        }
    }

    /// Attaches the optional raw-file archival sink.
    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn RawFileSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Executes one consumption attempt for the triggering event.
    ///
    /// Returns `None` when no task is associated with the event: the
    /// trigger is ignored. Otherwise the run terminates in `Succeeded` or
    /// `Failed` and the report reflects the terminal state; pipeline
    /// failures are captured on the task and in the report rather than
    /// returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the job/task system itself fails while
    /// recording progress or the terminal status.
    pub async fn execute(&self, event: &TriggerEvent) -> Result<Option<RunReport>> {
        let Some(task) = self.task_store.load_triggering_task(event).await? else {
            tracing::debug!(subject = %event.subject, "no task for trigger, ignoring");
            return Ok(None);
        };

        let run_id = RunId::generate();
        let span = run_span("consume", &run_id.to_string(), &task.uri);
        self.drive_to_terminal(run_id, task).instrument(span).await
    }

    async fn drive_to_terminal(&self, run_id: RunId, task: Task) -> Result<Option<RunReport>> {
        let mut report = RunReport::new(run_id, &task);

        report.transition_to(RunState::Busy)?;
        self.task_store.set_status(&task, RunState::Busy).await?;

        match self.drive(&task, &mut report).await {
            Ok(()) => {
                report.transition_to(RunState::Succeeded)?;
                self.task_store
                    .set_status(&task, RunState::Succeeded)
                    .await?;
                tracing::info!(
                    files = report.files_consumed.len(),
                    subjects = report.audit_subjects.len(),
                    "consumption run succeeded"
                );
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "consumption run failed");
                report.error = Some(message.clone());
                report.transition_to(RunState::Failed)?;
                self.task_store.record_error(&task, &message).await?;
                self.task_store.set_status(&task, RunState::Failed).await?;
            }
        }

        Ok(Some(report))
    }

    /// The task-type branch: everything between `Busy` and terminal.
    async fn drive(&self, task: &Task, report: &mut RunReport) -> Result<()> {
        match task.task_type {
            TaskType::FullSync => {
                let snapshot = self.snapshot_loader.load_latest_snapshot().await?;
                snapshot
                    .load_and_dispatch(self.options.targets.result_graph())
                    .await?;
            }
            TaskType::DeltaSync => self.consume_deltas(task, report).await?,
        }

        // Exactly one graph-result association per run.
        let graph_container = ResultContainer::generate();
        self.task_store
            .attach_result_graph(task, &graph_container, self.options.targets.result_graph())
            .await?;

        Ok(())
    }

    async fn consume_deltas(&self, task: &Task, report: &mut RunReport) -> Result<()> {
        let resolver = TimestampResolver::new(self.config.start_from_timestamp);
        let cursor = resolver.resolve(self.task_store).await?;
        report.cursor = Some(cursor);

        let catalog = DeltaCatalog::new(self.config.clone());
        let files = catalog.list(cursor).await?;

        let loader = DeltaFileLoader::new(self.config.clone());
        let applier = ChangeSetApplier::new(self.graph_store, self.config.batch_size);
        let targets = self.options.targets.graphs();
        let file_container = ResultContainer::generate();

        for descriptor in files {
            let span = file_span("apply", &descriptor.id);
            async {
                let loaded = loader.load(&descriptor, self.sink).await?;

                if let Some(artifact) = loaded.artifact {
                    self.task_store
                        .attach_result_file(task, &file_container, &artifact)
                        .await?;
                }

                for change_set in &loaded.change_sets {
                    let subjects = applier.apply(change_set, &targets).await?;
                    report.audit_subjects.extend(subjects);
                }

                report.files_consumed.push(descriptor.id.clone());
                Ok::<(), Error>(())
            }
            .instrument(span)
            .await?;
        }

        if self.options.emit_audit_file {
            let artifact = self.write_audit_file(&report.audit_subjects).await?;
            self.task_store
                .attach_result_file(task, &file_container, &artifact)
                .await?;
        }

        Ok(())
    }

    /// Writes the audit subject file: one subject per line, sorted for
    /// deterministic content.
    async fn write_audit_file(&self, subjects: &HashSet<String>) -> Result<FileArtifact> {
        let id = ArtifactId::generate();
        let name = format!("{id}.txt");
        let path = self.config.scratch_dir().join(&name);

        let mut sorted: Vec<&str> = subjects.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        let mut content = sorted.join("\n");
        content.push('\n');

        tokio::fs::create_dir_all(self.config.scratch_dir())
            .await
            .map_err(|e| {
                CoreError::io(format!("creating {}", self.config.scratch_dir().display()), e)
            })?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| CoreError::io(format!("writing {}", path.display()), e))?;

        Ok(FileArtifact {
            id,
            name,
            path,
            media_type: "text/plain".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use crate::task::MemoryTaskStore;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use sylva_core::MemoryGraphStore;

    #[derive(Default, Clone)]
    struct RecordingSnapshotLoader {
        dispatched_to: Arc<Mutex<Vec<GraphUri>>>,
    }

    struct RecordingSnapshot {
        dispatched_to: Arc<Mutex<Vec<GraphUri>>>,
    }

    #[async_trait]
    impl Snapshot for RecordingSnapshot {
        async fn load_and_dispatch(&self, target: &GraphUri) -> Result<()> {
            self.dispatched_to.lock().expect("lock").push(target.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl SnapshotLoader for RecordingSnapshotLoader {
        async fn load_latest_snapshot(&self) -> Result<Box<dyn Snapshot>> {
            Ok(Box::new(RecordingSnapshot {
                dispatched_to: Arc::clone(&self.dispatched_to),
            }))
        }
    }

    struct FailingSnapshotLoader;

    #[async_trait]
    impl SnapshotLoader for FailingSnapshotLoader {
        async fn load_latest_snapshot(&self) -> Result<Box<dyn Snapshot>> {
            Err(Error::Snapshot {
                message: "no dump available".to_string(),
            })
        }
    }

    fn landing() -> GraphUri {
        GraphUri::new("http://example.org/graphs/landing")
    }

    #[test]
    fn state_machine_accepts_the_linear_lifecycle() {
        assert!(RunState::Scheduled.can_transition_to(RunState::Busy));
        assert!(RunState::Busy.can_transition_to(RunState::Succeeded));
        assert!(RunState::Busy.can_transition_to(RunState::Failed));
    }

    #[test]
    fn state_machine_rejects_shortcuts_and_resurrection() {
        assert!(!RunState::Scheduled.can_transition_to(RunState::Succeeded));
        assert!(!RunState::Scheduled.can_transition_to(RunState::Failed));
        assert!(!RunState::Succeeded.can_transition_to(RunState::Busy));
        assert!(!RunState::Failed.can_transition_to(RunState::Busy));
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Busy.is_terminal());
    }

    #[test]
    fn write_targets_select_the_result_graph() {
        let single = WriteTargets::SingleGraph { landing: landing() };
        assert_eq!(single.graphs().len(), 1);
        assert_eq!(single.result_graph(), &landing());

        let result = GraphUri::new("http://example.org/graphs/run-result");
        let dual = WriteTargets::WithEphemeralResult {
            landing: landing(),
            result: result.clone(),
        };
        assert_eq!(dual.graphs().len(), 2);
        assert_eq!(dual.result_graph(), &result);
    }

    #[tokio::test]
    async fn unknown_trigger_is_ignored() {
        let task_store = MemoryTaskStore::new();
        let graph_store = MemoryGraphStore::new();
        let snapshots = RecordingSnapshotLoader::default();

        let run = ConsumptionRun::new(
            Config::new("http://127.0.0.1:9"),
            &task_store,
            &graph_store,
            &snapshots,
            RunOptions::single_graph(landing()),
        );

        let report = run
            .execute(&TriggerEvent::new("http://example.org/deltas/unknown"))
            .await
            .expect("execute");
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn full_sync_delegates_to_the_snapshot_loader() {
        let task_store = MemoryTaskStore::new();
        let task = Task::new("http://example.org/tasks/full", TaskType::FullSync);
        task_store.register("trigger", task.clone());
        let graph_store = MemoryGraphStore::new();
        let snapshots = RecordingSnapshotLoader::default();

        let run = ConsumptionRun::new(
            Config::new("http://127.0.0.1:9"),
            &task_store,
            &graph_store,
            &snapshots,
            RunOptions::single_graph(landing()),
        );

        let report = run
            .execute(&TriggerEvent::new("trigger"))
            .await
            .expect("execute")
            .expect("report");

        assert_eq!(report.state, RunState::Succeeded);
        assert!(report.files_consumed.is_empty());
        assert_eq!(
            *snapshots.dispatched_to.lock().expect("lock"),
            vec![landing()]
        );
        assert_eq!(task_store.status_of(&task.uri), Some(RunState::Succeeded));
        assert_eq!(task_store.result_graphs_of(&task.uri), vec![landing()]);
    }

    #[tokio::test]
    async fn full_sync_failure_is_recorded_on_the_task() {
        let task_store = MemoryTaskStore::new();
        let task = Task::new("http://example.org/tasks/full", TaskType::FullSync);
        task_store.register("trigger", task.clone());
        let graph_store = MemoryGraphStore::new();

        let run = ConsumptionRun::new(
            Config::new("http://127.0.0.1:9"),
            &task_store,
            &graph_store,
            &FailingSnapshotLoader,
            RunOptions::single_graph(landing()),
        );

        let report = run
            .execute(&TriggerEvent::new("trigger"))
            .await
            .expect("execute")
            .expect("report");

        assert_eq!(report.state, RunState::Failed);
        let error = report.error.expect("error message");
        assert!(!error.is_empty());
        assert_eq!(task_store.status_of(&task.uri), Some(RunState::Failed));
        assert_eq!(task_store.errors_of(&task.uri).len(), 1);
        // No result graph is attached on failure.
        assert!(task_store.result_graphs_of(&task.uri).is_empty());
    }

    #[tokio::test]
    async fn report_transition_timestamps_follow_the_lifecycle() {
        let task = Task::new("http://example.org/tasks/1", TaskType::DeltaSync);
        let mut report = RunReport::new(RunId::generate(), &task);
        assert!(report.started_at.is_none());

        report.transition_to(RunState::Busy).expect("busy");
        assert!(report.started_at.is_some());
        assert!(report.completed_at.is_none());

        report.transition_to(RunState::Succeeded).expect("success");
        assert!(report.completed_at.is_some());

        let err = report.transition_to(RunState::Busy).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }
}
