use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::errors::FuzzError;
use crate::harness::{execute_all, Harness};
use crate::models::{AttackScenario, IterationResult};
use crate::queue::{DurableQueue, QueueSink};
use super::progress::AttackProgress;

/// Counters shared by all workers of one run.
#[derive(Debug, Default)]
struct AttackCounters {
    scenarios: AtomicUsize,
    iterations: AtomicUsize,
    failed_iterations: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttackSummary {
    pub scenarios: usize,
    pub iterations: usize,
    pub failed_iterations: usize,
}

/// Pool of workers draining the scenario queue through the harness.
///
/// Every batch of iteration results is written to both the result queue (read
/// by the continuous monitor) and the durable results store (read by the
/// registry when joining findings).
#[derive(Clone)]
pub struct AttackQueue {
    scenarios: Arc<dyn DurableQueue<AttackScenario>>,
    results: Arc<dyn QueueSink<IterationResult>>,
    store: Arc<dyn QueueSink<IterationResult>>,
    harness: Arc<dyn Harness>,
    concurrency: usize,
    idle_wait: Duration,
    exit_when_idle: bool,
    progress: Arc<AttackProgress>,
    counters: Arc<AttackCounters>,
}

impl AttackQueue {
    pub fn new(
        scenarios: Arc<dyn DurableQueue<AttackScenario>>,
        results: Arc<dyn QueueSink<IterationResult>>,
        store: Arc<dyn QueueSink<IterationResult>>,
        harness: Arc<dyn Harness>,
        concurrency: usize,
    ) -> Self {
        Self {
            scenarios,
            results,
            store,
            harness,
            concurrency: concurrency.max(1),
            idle_wait: Duration::from_secs(1),
            exit_when_idle: false,
            progress: Arc::new(AttackProgress::hidden()),
            counters: Arc::new(AttackCounters::default()),
        }
    }

    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Workers stop once they find the scenario queue empty instead of polling.
    pub fn with_exit_when_idle(mut self, exit_when_idle: bool) -> Self {
        self.exit_when_idle = exit_when_idle;
        self
    }

    pub fn with_progress(mut self, progress: Arc<AttackProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs `concurrency` workers until `cancel` fires (or, with
    /// `exit_when_idle`, until every worker found the queue empty).
    pub async fn run(&self, cancel: CancellationToken) -> Result<AttackSummary, FuzzError> {
        info!(workers = self.concurrency, "Attack queue started");

        let handles: Vec<_> = (0..self.concurrency)
            .map(|worker| {
                let queue = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { queue.work(worker, cancel).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        for (worker, result) in results.iter().enumerate() {
            if let Err(e) = result {
                error!(worker, error = %e, "Attack worker panicked");
            }
        }

        self.progress.finish();
        let summary = self.summary();
        info!(
            scenarios = summary.scenarios,
            iterations = summary.iterations,
            failed_iterations = summary.failed_iterations,
            "Attack queue stopped"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> AttackSummary {
        AttackSummary {
            scenarios: self.counters.scenarios.load(Ordering::Relaxed),
            iterations: self.counters.iterations.load(Ordering::Relaxed),
            failed_iterations: self.counters.failed_iterations.load(Ordering::Relaxed),
        }
    }

    async fn work(&self, worker: usize, cancel: CancellationToken) {
        debug!(worker, "Attack worker started");
        while !cancel.is_cancelled() {
            let scenario = match self.scenarios.get().await {
                Ok(Some(scenario)) => scenario,
                Ok(None) => {
                    if self.exit_when_idle {
                        break;
                    }
                    self.idle(&cancel).await;
                    continue;
                }
                Err(e) => {
                    error!(worker, error = %e, "Failed to pop scenario");
                    self.idle(&cancel).await;
                    continue;
                }
            };
            self.attack(worker, scenario).await;
        }
        debug!(worker, "Attack worker stopped");
    }

    async fn attack(&self, worker: usize, scenario: AttackScenario) {
        let (results, failed) = execute_all(self.harness.as_ref(), &scenario).await.partition();
        if failed > 0 {
            warn!(
                worker,
                strategy = %scenario.strategy_name,
                path = %scenario.path,
                failed,
                total = scenario.total_iterations,
                "Some iterations failed"
            );
        }

        self.counters.scenarios.fetch_add(1, Ordering::Relaxed);
        self.counters.iterations.fetch_add(results.len(), Ordering::Relaxed);
        self.counters.failed_iterations.fetch_add(failed, Ordering::Relaxed);

        if !results.is_empty() {
            if let Err(e) = self.results.put(results.clone()).await {
                error!(worker, error = %e, "Failed to publish iteration results");
            }
            if let Err(e) = self.store.put(results).await {
                error!(worker, error = %e, "Failed to store iteration results");
            }
        }

        let remaining = self.scenarios.size().await.unwrap_or(0);
        self.progress.scenario_done(remaining, failed);
    }

    async fn idle(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.idle_wait) => {}
        }
    }
}
