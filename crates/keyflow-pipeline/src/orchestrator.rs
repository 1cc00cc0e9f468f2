//! Pipeline orchestrator
//!
//! Sequences the provisioning stages (create → settle wait → enable →
//! extract), threading each stage's survivors into the next. Stages are
//! strict barriers: the next stage never starts while the previous one
//! still has tasks in flight. All per-run state lives on the pipeline
//! value itself; nothing is shared through globals.

use crate::breaker::HealthMonitor;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::naming::{NameScheme, WorkItem};
use crate::report::{RunReport, StageKind, StageStats};
use crate::retry::{self, ItemFailure};
use crate::runner::StageRunner;
use crate::sink::{Credential, CredentialSink};
use indicatif::{ProgressBar, ProgressStyle};
use keyflow_cloud::{decode_credential_value, ErrorClass, ResourceProvider};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Boxed future produced by the per-stage task closures, so the helper
/// constructors below have a nameable return type.
type TaskFuture = Pin<Box<dyn Future<Output = std::result::Result<(), ItemFailure>> + Send>>;

/// Where a run enters the pipeline.
///
/// `Enable` and `Extract` serve the "extract from existing projects"
/// mode: the operator supplies identifiers and the run reuses the same
/// stage implementations, just without creating anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStage {
    Create,
    Enable,
    Extract,
}

/// The provisioning pipeline.
pub struct Pipeline {
    provider: Arc<dyn ResourceProvider>,
    config: PipelineConfig,
    sink: Arc<CredentialSink>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn ResourceProvider>, config: PipelineConfig) -> Self {
        Self {
            provider,
            config,
            sink: Arc::new(CredentialSink::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Token the caller cancels to interrupt the run. Dispatch stops,
    /// in-flight tasks get the configured grace period, and the sink is
    /// still flushed.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn sink(&self) -> Arc<CredentialSink> {
        self.sink.clone()
    }

    /// Full batch run: generate `count` fresh work items and push them
    /// through every stage.
    pub async fn provision(&self, count: usize) -> Result<RunReport> {
        let scheme = NameScheme::new(&self.config.prefix);
        tracing::info!(
            token = scheme.token(),
            count,
            prefix = %self.config.prefix,
            "generated work items for run"
        );
        self.run_from(scheme.generate(count), StartStage::Create)
            .await
    }

    /// Run the pipeline over pre-existing work items, entering at the
    /// given stage.
    pub async fn run_from(&self, items: Vec<WorkItem>, start: StartStage) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport {
            attempted: items.len(),
            ..Default::default()
        };

        // Truncate output files up front so a failed run never leaves
        // stale credentials from a previous one behind.
        self.sink.flush(&self.config.output_dir).await?;

        let result = self.run_stages(items, start, &mut report).await;

        report.credentials = self.sink.len().await;
        report.elapsed = started.elapsed();

        match result {
            Ok(()) => {
                report.outputs = Some(self.sink.flush(&self.config.output_dir).await?);
                tracing::info!(
                    credentials = report.credentials,
                    elapsed_s = report.elapsed.as_secs_f64(),
                    "run complete"
                );
                Ok(report)
            }
            Err(err) => {
                // Flush whatever made it into the sink before the failure.
                if let Err(flush_err) = self.sink.flush(&self.config.output_dir).await {
                    tracing::error!(error = %flush_err, "failed to flush credential files");
                }
                Err(err)
            }
        }
    }

    /// Delete the given resources with the same bounded-concurrency
    /// machinery. Zero survivors is not an error here; the report just
    /// says what happened.
    pub async fn cleanup(&self, items: Vec<WorkItem>) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport {
            attempted: items.len(),
            ..Default::default()
        };

        let monitor = self.monitor();
        let runner = self.runner(monitor, items.len() as u64, StageKind::Cleanup);

        let provider = self.provider.clone();
        let policy = self.config.retry.clone();
        let outcomes = runner
            .run("cleanup", items, move |item| {
                let provider = provider.clone();
                let policy = policy.clone();
                async move {
                    let result = retry::execute(&policy, "delete", || {
                        let provider = provider.clone();
                        let id = item.clone();
                        async move { provider.delete_resource(id.as_str()).await }
                    })
                    .await;

                    match result {
                        Ok(()) => Ok(()),
                        // Deleting something that is already gone is fine.
                        Err(f) if f.message.to_lowercase().contains("not found") => Ok(()),
                        Err(f) => Err(f),
                    }
                }
            })
            .await;

        report
            .stages
            .push((StageKind::Cleanup, StageStats::from_outcomes(&outcomes)));
        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn run_stages(
        &self,
        items: Vec<WorkItem>,
        start: StartStage,
        report: &mut RunReport,
    ) -> Result<()> {
        let monitor = self.monitor();
        let mut current = items;

        if start == StartStage::Create {
            current = self
                .run_stage(StageKind::Create, current, &monitor, report)
                .await?;
            self.settle_wait().await;
        }

        if start != StartStage::Extract {
            current = self
                .run_stage(StageKind::Enable, current, &monitor, report)
                .await?;
        }

        self.run_stage(StageKind::Extract, current, &monitor, report)
            .await?;
        Ok(())
    }

    /// Run one stage to its barrier and return the survivor set.
    async fn run_stage(
        &self,
        kind: StageKind,
        items: Vec<WorkItem>,
        monitor: &Option<Arc<HealthMonitor>>,
        report: &mut RunReport,
    ) -> Result<Vec<WorkItem>> {
        if let Some(monitor) = monitor {
            monitor.reset();
        }

        let attempted = items.len();
        let runner = self.runner(monitor.clone(), attempted as u64, kind);

        let outcomes = match kind {
            StageKind::Create => runner.run("create", items, self.create_task()).await,
            StageKind::Enable => runner.run("enable", items, self.enable_task()).await,
            StageKind::Extract => runner.run("extract", items, self.extract_task()).await,
            StageKind::Cleanup => unreachable!("cleanup runs outside the staged pipeline"),
        };

        report
            .stages
            .push((kind, StageStats::from_outcomes(&outcomes)));

        let survivors: Vec<WorkItem> = outcomes
            .into_iter()
            .filter(|o| o.outcome.is_success())
            .map(|o| o.item)
            .collect();

        tracing::info!(
            stage = %kind,
            attempted,
            survivors = survivors.len(),
            "stage complete"
        );

        if self.cancel.is_cancelled() {
            return Err(PipelineError::Interrupted);
        }

        if survivors.is_empty() {
            return Err(PipelineError::StageAborted {
                stage: kind,
                attempted,
            });
        }

        Ok(survivors)
    }

    fn create_task(
        &self,
    ) -> impl Fn(WorkItem) -> TaskFuture + use<> {
        let provider = self.provider.clone();
        let policy = self.config.retry.clone();
        move |item| {
            let provider = provider.clone();
            let policy = policy.clone();
            Box::pin(async move {
                let result = retry::execute(&policy, "create", || {
                    let provider = provider.clone();
                    let id = item.clone();
                    async move { provider.create_resource(id.as_str()).await }
                })
                .await;

                match result {
                    Ok(()) => Ok(()),
                    // A project left over from an interrupted run; reuse it.
                    Err(f) if f.class == ErrorClass::AlreadyExists => Ok(()),
                    Err(f) => Err(f),
                }
            })
        }
    }

    fn enable_task(
        &self,
    ) -> impl Fn(WorkItem) -> TaskFuture + use<> {
        let provider = self.provider.clone();
        let policy = self.config.retry.clone();
        let capability = self.config.capability.clone();
        move |item| {
            let provider = provider.clone();
            let policy = policy.clone();
            let capability = capability.clone();
            Box::pin(async move {
                let result = retry::execute(&policy, "enable", || {
                    let provider = provider.clone();
                    let id = item.clone();
                    let capability = capability.clone();
                    async move {
                        provider
                            .enable_capability(id.as_str(), &capability)
                            .await
                    }
                })
                .await;

                match result {
                    Ok(()) => Ok(()),
                    // Already enabled means the stage's goal is met.
                    Err(f) if f.class == ErrorClass::AlreadyExists => Ok(()),
                    Err(f) => Err(f),
                }
            })
        }
    }

    fn extract_task(
        &self,
    ) -> impl Fn(WorkItem) -> TaskFuture + use<> {
        let provider = self.provider.clone();
        let policy = self.config.retry.clone();
        let sink = self.sink.clone();
        move |item| {
            let provider = provider.clone();
            let policy = policy.clone();
            let sink = sink.clone();
            Box::pin(async move {
                let created = retry::execute(&policy, "create-credential", || {
                    let provider = provider.clone();
                    let id = item.clone();
                    async move { provider.create_credential(id.as_str()).await }
                })
                .await;

                let secret = match created {
                    Ok(raw) => decode_credential_value(&raw).ok_or_else(|| {
                        ItemFailure::new(
                            ErrorClass::InvalidArgument,
                            "credential payload had no key string",
                            1,
                        )
                    })?,
                    Err(f) if f.class == ErrorClass::AlreadyExists => {
                        // A key already exists on this project; fetch it
                        // instead of failing the item.
                        let refs = retry::execute(&policy, "list-credentials", || {
                            let provider = provider.clone();
                            let id = item.clone();
                            async move { provider.list_credentials(id.as_str()).await }
                        })
                        .await?;

                        refs.into_iter().find_map(|r| r.key_string).ok_or_else(|| {
                            ItemFailure::new(
                                ErrorClass::InvalidArgument,
                                "no existing credential carries a key string",
                                1,
                            )
                        })?
                    }
                    Err(f) => return Err(f),
                };

                sink.append(Credential::new(item, secret)).await;
                Ok(())
            })
        }
    }

    /// Heartbeat pause between create and enable, letting the provider's
    /// eventual consistency settle. Cancellation cuts it short.
    async fn settle_wait(&self) {
        let total = self.config.settle_wait;
        if total.is_zero() {
            return;
        }

        tracing::info!(
            seconds = total.as_secs(),
            "waiting for created projects to settle"
        );

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );

        let started = Instant::now();
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    spinner.finish_with_message("settle wait interrupted");
                    return;
                }
                _ = tick.tick() => {
                    let elapsed = started.elapsed();
                    if elapsed >= total {
                        break;
                    }
                    spinner.set_message(format!(
                        "Letting projects settle... {}s / {}s",
                        elapsed.as_secs(),
                        total.as_secs()
                    ));
                    spinner.tick();
                }
            }
        }
        spinner.finish_with_message("Projects settled ✓");
    }

    fn monitor(&self) -> Option<Arc<HealthMonitor>> {
        self.config.breaker_enabled.then(|| {
            Arc::new(HealthMonitor::new(
                self.config.breaker_threshold,
                self.config.breaker_min_samples,
            ))
        })
    }

    fn runner(
        &self,
        monitor: Option<Arc<HealthMonitor>>,
        total: u64,
        kind: StageKind,
    ) -> StageRunner {
        let mut runner = StageRunner::new(self.config.concurrency)
            .with_cancel(self.cancel.clone())
            .with_grace_period(self.config.grace_period);

        if self.config.burst_size > 0 {
            runner = runner.with_burst(self.config.burst_size, self.config.burst_pause);
        }
        if let Some(monitor) = monitor {
            runner = runner.with_monitor(monitor);
        }

        let progress = ProgressBar::new(total);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>8.cyan} [{bar:40.green}] {pos}/{len} {msg}")
                .unwrap(),
        );
        progress.set_prefix(kind.to_string());

        runner.with_progress(progress)
    }
}
