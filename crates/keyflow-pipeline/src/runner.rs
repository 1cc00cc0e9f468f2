//! Bounded concurrency stage runner
//!
//! Dispatches one task per work item onto the tokio runtime, capped by a
//! semaphore. Completions are reaped through a `JoinSet`, so a panicking
//! task is isolated to its own item. Dispatch stops early when the
//! cancellation token fires or the health monitor trips; items that were
//! never dispatched are reported as skipped, not failed.

use crate::breaker::HealthMonitor;
use crate::naming::WorkItem;
use crate::retry::ItemFailure;
use indicatif::ProgressBar;
use keyflow_cloud::ErrorClass;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Outcome of one work item in one stage
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Task completed successfully
    Success,
    /// Task completed with a terminal failure
    Failed(ItemFailure),
    /// Task was never dispatched (breaker trip or cancellation)
    Skipped,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}

/// One work item paired with its stage outcome
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub item: WorkItem,
    pub outcome: Outcome,
}

/// Runs a batch of independent work items with bounded concurrency.
pub struct StageRunner {
    concurrency: usize,
    burst_size: u32,
    burst_pause: Duration,
    grace_period: Duration,
    monitor: Option<Arc<HealthMonitor>>,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl StageRunner {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            burst_size: 0,
            burst_pause: Duration::ZERO,
            grace_period: Duration::from_secs(30),
            monitor: None,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Pause for `pause` after every `every` dispatched tasks. This is
    /// independent of the concurrency cap and exists to stay under the
    /// provider's own rate limiter.
    pub fn with_burst(mut self, every: u32, pause: Duration) -> Self {
        self.burst_size = every;
        self.burst_pause = pause;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<HealthMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// How long in-flight tasks may keep running after cancellation
    /// before they are aborted.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    fn should_stop(&self, stage: &str) -> bool {
        if self.cancel.is_cancelled() {
            tracing::warn!(stage, "cancellation requested, halting dispatch");
            return true;
        }
        if let Some(monitor) = &self.monitor {
            if monitor.should_halt() {
                tracing::warn!(
                    stage,
                    failure_rate = monitor.failure_rate(),
                    "failure rate over threshold, halting dispatch"
                );
                return true;
            }
        }
        false
    }

    /// Run `task` over every item. Returns one outcome per input item,
    /// in completion order, and only after every dispatched task has
    /// finished (barrier semantics).
    pub async fn run<F, Fut>(&self, stage: &str, items: Vec<WorkItem>, task: F) -> Vec<StageOutcome>
    where
        F: Fn(WorkItem) -> Fut,
        Fut: Future<Output = Result<(), ItemFailure>> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        tracing::info!(
            stage,
            total,
            concurrency = self.concurrency,
            "dispatching stage"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(WorkItem, Result<(), ItemFailure>)> = JoinSet::new();
        let mut item_by_task: HashMap<tokio::task::Id, WorkItem> = HashMap::new();
        let mut outcomes = Vec::with_capacity(total);

        let completed = Arc::new(AtomicUsize::new(0));
        let succeeded = Arc::new(AtomicUsize::new(0));
        let mut dispatched: u32 = 0;

        let mut iter = items.into_iter();
        while let Some(item) = iter.next() {
            if self.should_stop(stage) {
                outcomes.push(StageOutcome {
                    item,
                    outcome: Outcome::Skipped,
                });
                outcomes.extend(iter.map(|item| StageOutcome {
                    item,
                    outcome: Outcome::Skipped,
                }));
                break;
            }

            if self.burst_size > 0 && dispatched > 0 && dispatched % self.burst_size == 0 {
                tracing::debug!(stage, dispatched, "burst throttle pause");
                tokio::time::sleep(self.burst_pause).await;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("stage semaphore is never closed");

            // The permit wait is where the breaker usually catches up:
            // re-check before committing this item.
            if self.should_stop(stage) {
                outcomes.push(StageOutcome {
                    item,
                    outcome: Outcome::Skipped,
                });
                outcomes.extend(iter.map(|item| StageOutcome {
                    item,
                    outcome: Outcome::Skipped,
                }));
                break;
            }

            let fut = task(item.clone());
            let monitor = self.monitor.clone();
            let progress = self.progress.clone();
            let completed = completed.clone();
            let succeeded = succeeded.clone();
            let stage_name = stage.to_string();
            let task_item = item.clone();

            let handle = join_set.spawn(async move {
                let result = fut.await;
                let ok = result.is_ok();

                if let Some(monitor) = &monitor {
                    monitor.observe(ok);
                }

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let ok_count = if ok {
                    succeeded.fetch_add(1, Ordering::SeqCst) + 1
                } else {
                    succeeded.load(Ordering::SeqCst)
                };

                tracing::info!(
                    stage = %stage_name,
                    item = %task_item,
                    completed = done,
                    total,
                    succeeded = ok_count,
                    failed = done - ok_count,
                    "task completed"
                );

                if let Some(progress) = &progress {
                    progress.inc(1);
                    progress.set_message(format!("{} ok / {} failed", ok_count, done - ok_count));
                }

                drop(permit);
                (task_item, result)
            });
            item_by_task.insert(handle.id(), item);
            dispatched += 1;
        }

        self.reap(stage, &mut join_set, &item_by_task, &mut outcomes)
            .await;

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        outcomes
    }

    /// Collect every dispatched task. After cancellation, in-flight
    /// tasks get the grace period to finish before being aborted.
    async fn reap(
        &self,
        stage: &str,
        join_set: &mut JoinSet<(WorkItem, Result<(), ItemFailure>)>,
        item_by_task: &HashMap<tokio::task::Id, WorkItem>,
        outcomes: &mut Vec<StageOutcome>,
    ) {
        loop {
            let joined = if self.cancel.is_cancelled() {
                match tokio::time::timeout(self.grace_period, join_set.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(stage, "grace period elapsed, aborting in-flight tasks");
                        join_set.abort_all();
                        continue;
                    }
                }
            } else {
                join_set.join_next().await
            };

            let Some(joined) = joined else { break };

            match joined {
                Ok((item, Ok(()))) => outcomes.push(StageOutcome {
                    item,
                    outcome: Outcome::Success,
                }),
                Ok((item, Err(failure))) => {
                    tracing::warn!(stage, item = %item, error = %failure, "item failed");
                    outcomes.push(StageOutcome {
                        item,
                        outcome: Outcome::Failed(failure),
                    });
                }
                Err(join_err) => {
                    let Some(item) = item_by_task.get(&join_err.id()).cloned() else {
                        tracing::error!(stage, error = %join_err, "completion for unknown task");
                        continue;
                    };

                    let message = if join_err.is_cancelled() {
                        "task aborted during shutdown".to_string()
                    } else {
                        format!("task panicked: {}", join_err)
                    };
                    tracing::error!(stage, item = %item, error = %message, "task did not complete");

                    if let Some(monitor) = &self.monitor {
                        monitor.observe(false);
                    }
                    outcomes.push(StageOutcome {
                        item,
                        outcome: Outcome::Failed(ItemFailure::new(
                            ErrorClass::Transient,
                            message,
                            1,
                        )),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn items(count: usize) -> Vec<WorkItem> {
        (1..=count)
            .map(|i| WorkItem::new(format!("proj-{:03}", i)))
            .collect()
    }

    fn seq_of(item: &WorkItem) -> usize {
        item.as_str()
            .rsplit('-')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap()
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let runner = StageRunner::new(3);
        let outcomes = {
            let in_flight = in_flight.clone();
            let high_water = high_water.clone();
            runner
                .run("test", items(20), move |_item| {
                    let in_flight = in_flight.clone();
                    let high_water = high_water.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await
        };

        assert_eq!(outcomes.len(), 20);
        assert!(outcomes.iter().all(|o| o.outcome.is_success()));
        assert!(high_water.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_outcomes_cover_exactly_the_input_set() {
        let input = items(10);
        let input_set: HashSet<_> = input.iter().cloned().collect();

        let runner = StageRunner::new(4);
        let outcomes = runner
            .run("test", input, |item| async move {
                if seq_of(&item) % 3 == 0 {
                    Err(ItemFailure::new(ErrorClass::Transient, "boom", 1))
                } else {
                    Ok(())
                }
            })
            .await;

        let outcome_set: HashSet<_> = outcomes.iter().map(|o| o.item.clone()).collect();
        assert_eq!(outcome_set, input_set);

        let succeeded = outcomes.iter().filter(|o| o.outcome.is_success()).count();
        assert_eq!(succeeded, 7);
    }

    #[tokio::test]
    async fn test_panicking_task_is_isolated() {
        let runner = StageRunner::new(2);
        let outcomes = runner
            .run("test", items(6), |item| async move {
                if seq_of(&item) == 3 {
                    panic!("task blew up");
                }
                Ok(())
            })
            .await;

        assert_eq!(outcomes.len(), 6);
        let succeeded = outcomes.iter().filter(|o| o.outcome.is_success()).count();
        assert_eq!(succeeded, 5);

        let failed: Vec<_> = outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed(_)))
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(seq_of(&failed[0].item), 3);
    }

    #[tokio::test]
    async fn test_breaker_halts_dispatch() {
        let monitor = Arc::new(HealthMonitor::new(0.3, 10));
        let runner = StageRunner::new(1).with_monitor(monitor.clone());

        let outcomes = runner
            .run("test", items(20), |item| async move {
                if seq_of(&item) <= 10 {
                    Err(ItemFailure::new(ErrorClass::Transient, "quota exceeded", 1))
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(monitor.should_halt());
        assert_eq!(outcomes.len(), 20);

        let skipped = outcomes.iter().filter(|o| o.outcome.is_skipped()).count();
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed(_)))
            .count();
        let succeeded = outcomes.iter().filter(|o| o.outcome.is_success()).count();

        // First 10 genuinely fail, then the breaker stops everything else.
        assert_eq!(failed, 10);
        assert_eq!(skipped, 10);
        assert_eq!(succeeded, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_throttle_pauses_between_batches() {
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let runner = StageRunner::new(8).with_burst(2, Duration::from_secs(1));
        let outcomes = {
            let stamps = stamps.clone();
            runner
                .run("test", items(6), move |_item| {
                    let stamps = stamps.clone();
                    async move {
                        stamps.lock().unwrap().push(tokio::time::Instant::now());
                        Ok(())
                    }
                })
                .await
        };

        assert_eq!(outcomes.len(), 6);
        assert!(outcomes.iter().all(|o| o.outcome.is_success()));

        // Two tasks per batch, one second of throttle between batches.
        let stamps = stamps.lock().unwrap();
        let start = stamps[0];
        let offsets: Vec<u64> = stamps.iter().map(|t| (*t - start).as_secs()).collect();
        assert_eq!(offsets, vec![0, 0, 1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_everything() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let runner = StageRunner::new(4).with_cancel(cancel);
        let outcomes = runner
            .run("test", items(8), |_item| async move { Ok(()) })
            .await;

        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().all(|o| o.outcome.is_skipped()));
    }

    #[tokio::test]
    async fn test_empty_input_returns_immediately() {
        let runner = StageRunner::new(4);
        let outcomes = runner
            .run("test", Vec::new(), |_item| async move { Ok(()) })
            .await;
        assert!(outcomes.is_empty());
    }
}
