use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::config::MonitoringSettings;
use crate::db::ScannerStore;
use crate::errors::FuzzError;
use crate::matching::MatchEngine;
use crate::models::{AttackScenario, IterationResult};
use crate::queue::{DurableQueue, QueueSink, VulnerabilitySink};
use crate::scanners::{capture_process_list, DnsListener, FileDeltaReader, Monitors};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContinuousSummary {
    pub results_scanned: usize,
    pub findings: usize,
    pub derived_scenarios: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodicSummary {
    pub ticks: usize,
    pub findings: usize,
    pub overruns: usize,
}

/// The two scanning loops: the continuous one over iteration results and the
/// periodic one over side channels (process list, watched files).
pub struct Monitoring {
    results: Arc<dyn DurableQueue<IterationResult>>,
    scenarios: Arc<dyn QueueSink<AttackScenario>>,
    scanners: Arc<ScannerStore>,
    engine: Arc<MatchEngine>,
    sink: Arc<dyn VulnerabilitySink>,
    settings: MonitoringSettings,
    files: FileDeltaReader,
    exit_when_idle: bool,
}

impl Monitoring {
    pub fn new(
        results: Arc<dyn DurableQueue<IterationResult>>,
        scenarios: Arc<dyn QueueSink<AttackScenario>>,
        scanners: Arc<ScannerStore>,
        sink: Arc<dyn VulnerabilitySink>,
        settings: MonitoringSettings,
    ) -> Self {
        Self {
            results,
            scenarios,
            scanners,
            engine: Arc::new(MatchEngine::new()),
            sink,
            settings,
            files: FileDeltaReader::new(),
            exit_when_idle: false,
        }
    }

    /// The continuous loop returns once the result queue is empty instead of
    /// polling for more.
    pub fn with_exit_when_idle(mut self, exit_when_idle: bool) -> Self {
        self.exit_when_idle = exit_when_idle;
        self
    }

    pub fn engine(&self) -> &Arc<MatchEngine> {
        &self.engine
    }

    /// Drains the result queue into the result scanners, re-enqueueing
    /// per-parameter scenarios when a result asks for them.
    pub async fn run_continuous(&self, cancel: CancellationToken) -> Result<ContinuousSummary, FuzzError> {
        info!("Continuous monitoring started");
        let mut summary = ContinuousSummary::default();
        let mut monitors = Arc::new(Monitors::default());

        while !cancel.is_cancelled() {
            let result = match self.results.get().await {
                Ok(Some(result)) => result,
                Ok(None) => {
                    if self.exit_when_idle {
                        break;
                    }
                    self.idle(&cancel, self.settings.idle_wait()).await;
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Failed to pop iteration result");
                    self.idle(&cancel, self.settings.idle_wait()).await;
                    continue;
                }
            };

            monitors = self.refreshed(monitors);
            match monitors.scan_result(&self.engine, self.sink.as_ref(), &result).await {
                Ok(found) => summary.findings += found,
                Err(e) => warn!(path = %result.scenario.path, error = %e, "Failed to scan iteration result"),
            }
            summary.results_scanned += 1;
            summary.derived_scenarios += self.enqueue_variants(&result).await;

            tokio::task::yield_now().await;
        }

        info!(
            results = summary.results_scanned,
            findings = summary.findings,
            derived = summary.derived_scenarios,
            "Continuous monitoring stopped"
        );
        Ok(summary)
    }

    /// Latest registered monitors, or `previous` when the store cannot be read.
    fn refreshed(&self, previous: Arc<Monitors>) -> Arc<Monitors> {
        match self.scanners.monitors() {
            Ok(latest) => latest,
            Err(e) => {
                warn!(error = %e, "Failed to refresh monitors, using previous set");
                previous
            }
        }
    }

    async fn enqueue_variants(&self, result: &IterationResult) -> usize {
        let variants = result.scenario.per_parameter_variants(&result.output);
        if variants.is_empty() {
            return 0;
        }
        let count = variants.len();
        match self.scenarios.put(variants).await {
            Ok(()) => {
                debug!(path = %result.scenario.path, count, "Enqueued per-parameter scenarios");
                count
            }
            Err(e) => {
                error!(path = %result.scenario.path, error = %e, "Failed to enqueue per-parameter scenarios");
                0
            }
        }
    }

    /// Fixed-interval scans of the process list and watched files. The DNS
    /// listener, when configured, lives exactly as long as this loop.
    pub async fn run_periodic(&self, cancel: CancellationToken) -> Result<PeriodicSummary, FuzzError> {
        let monitors = self.refreshed(Arc::new(Monitors::default()));
        let listener = match self.settings.dns_listen {
            Some(addr) => {
                if !monitors.has_dns_scanners() {
                    warn!(%addr, "DNS listener configured but no DNS scanners are registered");
                }
                Some(DnsListener::start(addr, self.scanners.clone(), self.engine.clone(), self.sink.clone()).await?)
            }
            None => None,
        };

        let outcome = self.periodic_loop(monitors, &cancel).await;

        if let Some(listener) = listener {
            listener.stop().await;
        }
        outcome
    }

    async fn periodic_loop(
        &self,
        mut monitors: Arc<Monitors>,
        cancel: &CancellationToken,
    ) -> Result<PeriodicSummary, FuzzError> {
        let interval = self.settings.periodic_interval();
        let overrun = interval.mul_f64(1.1);
        let mut summary = PeriodicSummary::default();
        info!(interval_ms = interval.as_millis() as u64, "Periodic monitoring started");

        while !cancel.is_cancelled() {
            let started = Instant::now();

            monitors = self.refreshed(monitors);
            summary.findings += self.tick(&monitors).await;
            summary.ticks += 1;

            let elapsed = started.elapsed();
            if elapsed > overrun {
                summary.overruns += 1;
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "Periodic scan took longer than its interval"
                );
            }
            self.idle(cancel, interval.saturating_sub(elapsed)).await;
        }

        info!(ticks = summary.ticks, findings = summary.findings, "Periodic monitoring stopped");
        Ok(summary)
    }

    async fn tick(&self, monitors: &Monitors) -> usize {
        let mut found = 0;
        if monitors.has_process_scanners() {
            match capture_process_list().await {
                Ok(ps) => {
                    found += monitors.scan_process_list(&self.engine, self.sink.as_ref(), &ps).await;
                }
                Err(e) => warn!(error = %e, "Failed to capture process list"),
            }
        }
        found += monitors.scan_files(&self.engine, self.sink.as_ref(), &self.files).await;
        found
    }

    async fn idle(&self, cancel: &CancellationToken, wait: Duration) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
