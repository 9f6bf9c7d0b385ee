//! Plan execution.
//!
//! The executor walks the plan entry by entry. Single stages run one at a
//! time; parallel groups start every member together and wait for all of
//! them. Each stage runs on its own task so a panic becomes a failed record
//! instead of tearing down the run. After the main phase the post phase runs
//! exactly once: post stages, artifact archival, the run record, optional
//! packaging, and notification.

use super::{ExecutionPlan, FailureCollector, Phase, PlanEntry, StageSpec};
use crate::aggregate::{
    ArchiveState, ArtifactArchiver, PipelineRun, PostActionRecord, ResultAggregator, StageRecord,
    RUN_RECORD_FILE,
};
use crate::cancellation::{CancellationToken, CleanupRegistry};
use crate::config::RunnerConfig;
use crate::context::{RunContext, StageContext};
use crate::core::{Artifact, FailurePolicy, PipelineEvent, PipelineStatus, StageOutput, StageStatus};
use crate::errors::ScanflowError;
use crate::events::{EventSink, NoOpEventSink};
use crate::notify::{LoggingNotifier, Notification, Notifier, ReportPackager};
use crate::observability::WideEventEmitter;
use crate::process::{CommandRunner, TokioCommandRunner};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default bound on each resource release.
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on each notifier.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs execution plans.
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    events: Arc<dyn EventSink>,
    notifiers: Vec<Arc<dyn Notifier>>,
    packager: Option<ReportPackager>,
    cleanup_timeout: Duration,
    notify_timeout: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an executor running real processes, with no notifiers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runner: Arc::new(TokioCommandRunner::new()),
            events: Arc::new(NoOpEventSink),
            notifiers: Vec::new(),
            packager: None,
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Creates an executor from runner configuration.
    ///
    /// Adds a [`LoggingNotifier`] and, when `compress_reports` is set, a
    /// packager using `compress_command`.
    #[must_use]
    pub fn from_config(config: &RunnerConfig) -> Self {
        let mut executor = Self::new()
            .with_cleanup_timeout(config.cleanup_timeout())
            .with_notifier(LoggingNotifier);
        if config.compress_reports {
            executor = executor.with_packager(ReportPackager::new(&config.compress_command));
        }
        executor
    }

    /// Sets the command runner handed to stages.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Adds a notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Arc::new(notifier));
        self
    }

    /// Adds a shared notifier.
    #[must_use]
    pub fn with_shared_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Enables packaging of the report directory.
    #[must_use]
    pub fn with_packager(mut self, packager: ReportPackager) -> Self {
        self.packager = Some(packager);
        self
    }

    /// Sets the per-resource release timeout.
    #[must_use]
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    /// Sets the per-notifier timeout.
    #[must_use]
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Runs a plan to completion.
    pub async fn run(&self, plan: &ExecutionPlan, run: Arc<RunContext>) -> PipelineRun {
        self.run_with_cancel(plan, run, Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs a plan under an external cancellation token.
    ///
    /// Cancelling stops the main phase; the post phase still runs, on a
    /// token of its own, and the run ends `cancelled`.
    pub async fn run_with_cancel(
        &self,
        plan: &ExecutionPlan,
        run: Arc<RunContext>,
        cancel: Arc<CancellationToken>,
    ) -> PipelineRun {
        let start = Instant::now();
        let run_id = run.identity().run_id.to_string();
        info!(
            pipeline = %plan.name(),
            run = %run.identity().label(),
            stages = plan.stage_count(),
            "Pipeline started"
        );
        self.events
            .emit(
                PipelineEvent::pipeline_started(plan.name(), plan.stage_count())
                    .add_data("run_id", serde_json::json!(run_id)),
            )
            .await;

        let mut aggregator = ResultAggregator::new(&run);
        let mut failures = FailureCollector::new();

        for entry in plan.entries() {
            if let Some(reason) = halt_reason(&cancel, &failures) {
                for spec in entry.stages() {
                    let record =
                        StageRecord::skipped(&spec.name, spec.policy, Phase::Main, reason.clone())
                            .in_group(entry.group());
                    self.finish_record(&run_id, &record);
                    aggregator.record(record);
                }
                continue;
            }

            let history: Arc<[StageRecord]> = aggregator.records().into();
            for record in self.run_entry(entry, &run, history, &cancel).await {
                failures.record(
                    &record.name,
                    record.policy,
                    record.status,
                    record.error.as_deref(),
                    record.exit_code,
                );
                aggregator.record(record);
            }

            if let Some(reason) = failures.abort_reason() {
                if !cancel.is_cancelled() {
                    warn!(pipeline = %plan.name(), %reason, "Aborting main phase");
                }
            }
        }

        let status = if cancel.is_cancelled() {
            PipelineStatus::Cancelled
        } else if failures.should_stop() {
            PipelineStatus::Failed
        } else {
            PipelineStatus::Success
        };

        let mut record = self
            .run_post_phase(plan, &run, &run_id, aggregator, status, failures)
            .await;
        record.finished_at = crate::utils::iso_timestamp();
        record.duration_ms = crate::utils::elapsed_ms(start);

        if record.status.is_success() {
            info!(pipeline = %plan.name(), status = %record.status, duration_ms = record.duration_ms, "Pipeline finished");
        } else {
            warn!(
                pipeline = %plan.name(),
                status = %record.status,
                reason = record.failures.abort_reason.as_deref().unwrap_or(""),
                duration_ms = record.duration_ms,
                "Pipeline finished"
            );
        }
        self.events.emit(WideEventEmitter::pipeline_event(&record)).await;
        record
    }

    async fn run_entry(
        &self,
        entry: &PlanEntry,
        run: &Arc<RunContext>,
        history: Arc<[StageRecord]>,
        cancel: &Arc<CancellationToken>,
    ) -> Vec<StageRecord> {
        let group = entry.group();
        if let Some(group) = group {
            debug!(group, members = entry.stages().len(), "Starting parallel group");
        }

        let mut active = FuturesUnordered::new();
        for (index, spec) in entry.stages().iter().enumerate() {
            let task = self.spawn_stage(
                spec,
                group,
                Phase::Main,
                run,
                history.clone(),
                cancel.clone(),
            );
            active.push(async move { (index, task.await) });
        }

        let mut records: Vec<Option<StageRecord>> = vec![None; entry.stages().len()];
        while let Some((index, record)) = active.next().await {
            records[index] = Some(record);
        }
        records.into_iter().flatten().collect()
    }

    /// Runs one stage on its own task.
    ///
    /// Stage panics are caught inside the task; a task that still dies becomes
    /// a failed record.
    fn spawn_stage(
        &self,
        spec: &StageSpec,
        group: Option<&str>,
        phase: Phase,
        run: &Arc<RunContext>,
        history: Arc<[StageRecord]>,
        cancel: Arc<CancellationToken>,
    ) -> impl std::future::Future<Output = StageRecord> + Send + 'static {
        let executor = self.clone();
        let spec = spec.clone();
        let group = group.map(String::from);
        let run = run.clone();
        let name = spec.name.clone();
        let policy = spec.policy;
        let run_id = run.identity().run_id.to_string();

        let handle = tokio::spawn({
            let group = group.clone();
            async move {
                executor
                    .run_stage(spec, group.as_deref(), phase, run, history, cancel)
                    .await
            }
        });

        let events = self.events.clone();
        async move {
            match handle.await {
                Ok(record) => record,
                Err(e) => {
                    let reason = if e.is_panic() {
                        format!("stage '{name}' panicked")
                    } else {
                        format!("stage '{name}' task was aborted")
                    };
                    error!(stage = %name, %reason, "Stage task failed");
                    let record =
                        StageRecord::from_output(&name, policy, phase, StageOutput::fail(reason))
                            .in_group(group.as_deref());
                    events.try_emit(WideEventEmitter::stage_event(&run_id, &record));
                    record
                }
            }
        }
    }

    async fn run_stage(
        self,
        spec: StageSpec,
        group: Option<&str>,
        phase: Phase,
        run: Arc<RunContext>,
        history: Arc<[StageRecord]>,
        cancel: Arc<CancellationToken>,
    ) -> StageRecord {
        let run_id = run.identity().run_id.to_string();

        if let Some(guard) = &spec.guard {
            if !guard.allows(&run, &history) {
                let reason = format!("guard '{}' was false", guard.description());
                let record =
                    StageRecord::skipped(&spec.name, spec.policy, phase, reason).in_group(group);
                self.finish_record(&run_id, &record);
                return record;
            }
        }

        let ctx = StageContext::new(
            run.clone(),
            spec.name.clone(),
            self.runner.clone(),
            self.events.clone(),
            cancel.clone(),
        );
        let started_at = crate::utils::iso_timestamp();
        let start = Instant::now();
        info!(stage = %spec.name, policy = %spec.policy, ?phase, "Stage started");
        ctx.emit(
            PipelineEvent::stage_started(&spec.name)
                .add_data("policy", serde_json::json!(spec.policy))
                .add_data("phase", serde_json::json!(phase)),
        );

        // The registry outlives a panicking stage so its resources are still released.
        let registry = CleanupRegistry::new();
        let work = async {
            self.acquire_resources(&spec, &ctx, &registry).await?;
            Ok::<_, ScanflowError>(spec.runner.execute(&ctx).await)
        };
        let mut output = tokio::select! {
            biased;
            result = AssertUnwindSafe(work).catch_unwind() => match result {
                Ok(Ok(output)) => output,
                Ok(Err(ScanflowError::Cancelled(reason))) => StageOutput::cancel(reason),
                Ok(Err(e)) => StageOutput::fail(e.to_string()),
                Err(payload) => {
                    let reason = format!("stage '{}' panicked: {}", spec.name, panic_message(payload.as_ref()));
                    error!(stage = %spec.name, reason = %run.redact(&reason), "Stage panicked");
                    StageOutput::fail(reason)
                }
            },
            () = cancel.cancelled() => StageOutput::cancel(
                cancel.reason().unwrap_or_else(|| "run cancelled".to_string()),
            ),
        };

        if spec.policy == FailurePolicy::Fatal && matches!(output.status, StageStatus::Success | StageStatus::Unstable) {
            if let Some(missing) = first_missing(run.workspace(), &spec.artifacts).await {
                output.status = StageStatus::Failed;
                output.error = Some(format!("declared artifact '{}' is missing", missing.display()));
            }
        }

        let post_actions = self.run_post_actions(&spec, &ctx, output.status).await;
        self.release_resources(&ctx, &registry).await;

        let mut record = StageRecord::from_output(&spec.name, spec.policy, phase, redact_output(&run, output))
            .in_group(group)
            .with_timing(started_at, crate::utils::elapsed_ms(start));
        record.post_actions = post_actions;
        record.add_artifacts(
            spec.artifacts
                .iter()
                .map(|path| Artifact::new(artifact_name(path), path.clone(), &spec.name)),
        );
        self.finish_record(&run_id, &record);
        record
    }

    async fn acquire_resources(
        &self,
        spec: &StageSpec,
        ctx: &StageContext,
        registry: &CleanupRegistry,
    ) -> Result<(), ScanflowError> {
        for resource in &spec.resources {
            if ctx.is_cancelled() {
                return Err(ScanflowError::cancelled(ctx.cancellation().reason()));
            }
            let name = resource.name().to_string();
            let handle = resource.acquire(ctx).await?;
            debug!(stage = %spec.name, resource = %name, "Resource acquired");
            ctx.emit(PipelineEvent::new("resource.acquired").add_data("resource", serde_json::json!(name)));
            registry.register(name, move || handle.release());
        }
        Ok(())
    }

    async fn release_resources(&self, ctx: &StageContext, registry: &CleanupRegistry) {
        if registry.pending_count() == 0 {
            return;
        }
        let report = registry.run_all(self.cleanup_timeout).await;
        for name in &report.completed {
            ctx.emit(
                PipelineEvent::new("resource.released")
                    .add_data("resource", serde_json::json!(name))
                    .add_data("clean", serde_json::json!(true)),
            );
        }
        for (name, reason) in &report.failed {
            ctx.emit(
                PipelineEvent::new("resource.released")
                    .add_data("resource", serde_json::json!(name))
                    .add_data("clean", serde_json::json!(false))
                    .add_data("error", serde_json::json!(reason)),
            );
        }
    }

    /// Runs matching post actions in order, detached from run cancellation.
    async fn run_post_actions(
        &self,
        spec: &StageSpec,
        ctx: &StageContext,
        status: StageStatus,
    ) -> Vec<PostActionRecord> {
        let matching: Vec<_> = spec.post.iter().filter(|a| a.condition.matches(status)).collect();
        if matching.is_empty() {
            return Vec::new();
        }

        let detached = ctx.detached();
        let mut records = Vec::with_capacity(matching.len());
        for action in matching {
            let output = AssertUnwindSafe(action.runner.execute(&detached))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    StageOutput::fail(format!(
                        "post action '{}' panicked: {}",
                        action.runner.name(),
                        panic_message(payload.as_ref())
                    ))
                });
            let output = redact_output(ctx.run(), output);
            if output.is_failure() {
                warn!(
                    stage = %spec.name,
                    action = %action.runner.name(),
                    condition = %action.condition,
                    error = output.error.as_deref().unwrap_or(""),
                    "Post action failed"
                );
            }
            records.push(PostActionRecord {
                name: action.runner.name().to_string(),
                condition: action.condition,
                status: output.status,
                error: output.error,
            });
        }
        records
    }

    async fn run_post_phase(
        &self,
        plan: &ExecutionPlan,
        run: &Arc<RunContext>,
        run_id: &str,
        mut aggregator: ResultAggregator,
        status: PipelineStatus,
        failures: FailureCollector,
    ) -> PipelineRun {
        let post_cancel = Arc::new(CancellationToken::new());
        info!(pipeline = %plan.name(), status = %status, post_stages = plan.post_stages().len(), "Post phase started");
        self.events
            .emit(
                PipelineEvent::new("post.started")
                    .add_data("pipeline", serde_json::json!(plan.name()))
                    .add_data("status", serde_json::json!(status)),
            )
            .await;

        for spec in plan.post_stages() {
            let history: Arc<[StageRecord]> = aggregator.records().into();
            let record = self
                .spawn_stage(spec, None, Phase::Post, run, history, post_cancel.clone())
                .await;
            aggregator.record_post(record);
        }

        let mut record = aggregator.finish(status, failures.summary());
        self.archive(run, run_id, &mut record).await;
        self.write_run_record(run, &record).await;

        if let Some(packager) = &self.packager {
            let report_dir = run.report_dir();
            match packager
                .package(&report_dir, self.runner.as_ref(), &post_cancel)
                .await
            {
                Ok(bundle) => {
                    info!(bundle = %bundle.display(), "Reports packaged");
                    record.bundle = Some(bundle);
                }
                Err(e) => warn!(error = %format!("{e:#}"), "Report packaging failed"),
            }
        }

        self.notify(&mut record).await;
        if record.bundle.is_some() || !record.notified.is_empty() {
            self.write_run_record(run, &record).await;
        }

        self.events
            .emit(
                PipelineEvent::new("post.completed")
                    .add_data("pipeline", serde_json::json!(plan.name()))
                    .add_data("notified", serde_json::json!(record.notified)),
            )
            .await;
        record
    }

    async fn archive(&self, run: &RunContext, run_id: &str, record: &mut PipelineRun) {
        let archiver = ArtifactArchiver::new(run.workspace(), run.report_dir());
        let artifacts = record.artifacts();
        let result = tokio::task::spawn_blocking(move || archiver.archive(&artifacts)).await;

        let manifest = match result {
            Ok(Ok(manifest)) => manifest,
            Ok(Err(e)) => {
                warn!(error = %e, "Artifact archival failed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Artifact archival task failed");
                return;
            }
        };

        for entry in &manifest.entries {
            let event = match &entry.state {
                ArchiveState::Archived { size, archived_as, .. } => PipelineEvent::new("artifact.archived")
                    .add_data("size", serde_json::json!(size))
                    .add_data("archived_as", serde_json::json!(archived_as)),
                ArchiveState::Missing => PipelineEvent::new("artifact.missing"),
                ArchiveState::Failed { reason } => {
                    PipelineEvent::new("artifact.missing").add_data("error", serde_json::json!(reason))
                }
            };
            self.events
                .emit(
                    event
                        .add_data("run_id", serde_json::json!(run_id))
                        .add_data("artifact", serde_json::json!(entry.artifact.name))
                        .add_data("stage", serde_json::json!(entry.artifact.stage))
                        .add_data("path", serde_json::json!(entry.artifact.path)),
                )
                .await;
        }
        info!(
            archived = manifest.archived_count(),
            missing = manifest.missing_count(),
            dir = %manifest.directory.display(),
            "Artifacts archived"
        );
        record.manifest = Some(manifest);
    }

    async fn write_run_record(&self, run: &RunContext, record: &PipelineRun) {
        let archiver = ArtifactArchiver::new(run.workspace(), run.report_dir());
        let snapshot = record.clone();
        let written =
            tokio::task::spawn_blocking(move || archiver.write_json(RUN_RECORD_FILE, &snapshot))
                .await;
        match written {
            Ok(Ok(path)) => debug!(path = %path.display(), "Run record written"),
            Ok(Err(e)) => warn!(error = %e, "Run record could not be written"),
            Err(e) => warn!(error = %e, "Run record task failed"),
        }
    }

    async fn notify(&self, record: &mut PipelineRun) {
        if self.notifiers.is_empty() {
            return;
        }
        let notification = Notification::from_run(record);
        for notifier in &self.notifiers {
            let name = notifier.name().to_string();
            let sent = tokio::time::timeout(self.notify_timeout, notifier.send(&notification)).await;
            let error = match sent {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{e:#}")),
                Err(_) => Some(format!("timed out after {:?}", self.notify_timeout)),
            };
            match error {
                None => {
                    debug!(notifier = %name, "Notification sent");
                    self.events
                        .emit(PipelineEvent::new("notify.sent").add_data("notifier", serde_json::json!(name)))
                        .await;
                    record.notified.push(name);
                }
                Some(error) => {
                    warn!(notifier = %name, %error, "Notification failed");
                    self.events
                        .emit(
                            PipelineEvent::new("notify.failed")
                                .add_data("notifier", serde_json::json!(name))
                                .add_data("error", serde_json::json!(error)),
                        )
                        .await;
                }
            }
        }
    }

    fn finish_record(&self, run_id: &str, record: &StageRecord) {
        match record.status {
            StageStatus::Failed => warn!(
                stage = %record.name,
                policy = %record.policy,
                exit_code = record.exit_code,
                error = record.error.as_deref().unwrap_or(""),
                "Stage failed"
            ),
            StageStatus::Unstable => warn!(
                stage = %record.name,
                warning = record.error.as_deref().unwrap_or(""),
                "Stage unstable"
            ),
            StageStatus::Skipped | StageStatus::Cancelled => info!(
                stage = %record.name,
                status = %record.status,
                reason = record.skip_reason.as_deref().unwrap_or(""),
                "Stage not completed"
            ),
            _ => info!(stage = %record.name, duration_ms = record.duration_ms, "Stage completed"),
        }
        self.events.try_emit(WideEventEmitter::stage_event(run_id, record));
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field(
                "notifiers",
                &self.notifiers.iter().map(|n| n.name().to_string()).collect::<Vec<_>>(),
            )
            .field("packager", &self.packager)
            .field("cleanup_timeout", &self.cleanup_timeout)
            .field("notify_timeout", &self.notify_timeout)
            .finish_non_exhaustive()
    }
}

fn halt_reason(cancel: &CancellationToken, failures: &FailureCollector) -> Option<String> {
    if cancel.is_cancelled() {
        let reason = cancel.reason().unwrap_or_else(|| "no reason given".to_string());
        return Some(format!("run cancelled: {reason}"));
    }
    failures.abort_reason().map(|reason| format!("not started: {reason}"))
}

/// Masks credential values in every free-text field of a stage output.
fn redact_output(run: &RunContext, mut output: StageOutput) -> StageOutput {
    if run.credentials().is_empty() {
        return output;
    }
    output.error = output.error.map(|e| run.redact(&e));
    output.skip_reason = output.skip_reason.map(|r| run.redact(&r));
    output.stdout = run.redact(&output.stdout);
    output.stderr = run.redact(&output.stderr);
    if let Some(gate) = output.gate.as_mut() {
        gate.detail = gate.detail.as_deref().map(|d| run.redact(d));
    }
    output
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn artifact_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

async fn first_missing<'a>(workspace: &Path, artifacts: &'a [std::path::PathBuf]) -> Option<&'a Path> {
    for path in artifacts {
        let resolved = if path.is_absolute() {
            path.clone()
        } else {
            workspace.join(path)
        };
        if !tokio::fs::try_exists(&resolved).await.unwrap_or(false) {
            return Some(path.as_path());
        }
    }
    None
}
