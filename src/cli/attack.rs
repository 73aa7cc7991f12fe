use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use crate::config::{self, FuzzConfig};
use crate::errors::FuzzError;
use crate::harness::{Harness, SubprocessHarness};
use crate::pipeline::{AttackProgress, AttackQueue, Monitoring};
use crate::queue::DurableQueue;
use super::commands::AttackArgs;
use super::stores::RunStores;

pub async fn handle_attack(config_path: &str, args: AttackArgs) -> Result<(), FuzzError> {
    let config = config::parse_config(Path::new(config_path)).await?;
    let stores = RunStores::open(&config)?;
    let workers = args.workers.unwrap_or(config.concurrent_queues);

    let queue = attack_queue(&config, &stores, workers)
        .await?
        .with_exit_when_idle(args.exit_when_drained);
    queue.run(cancel_on_ctrl_c()).await?;
    Ok(())
}

/// Attack queue and both monitoring loops in one process.
pub async fn handle_fuzz(config_path: &str) -> Result<(), FuzzError> {
    let config = config::parse_config(Path::new(config_path)).await?;
    let stores = RunStores::open(&config)?;
    let cancel = cancel_on_ctrl_c();

    let queue = attack_queue(&config, &stores, config.concurrent_queues).await?;
    let monitoring = Arc::new(Monitoring::new(
        stores.results.clone(),
        stores.scenarios.clone(),
        stores.scanners.clone(),
        stores.vulnerabilities.clone(),
        config.monitoring.clone(),
    ));

    let continuous = {
        let monitoring = monitoring.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { monitoring.run_continuous(cancel).await })
    };
    let periodic = {
        let monitoring = monitoring.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { monitoring.run_periodic(cancel).await })
    };

    let attack = queue.run(cancel.clone()).await;
    // a failing loop stops the others
    cancel.cancel();
    let continuous = continuous
        .await
        .map_err(|e| FuzzError::Internal(format!("Continuous monitor panicked: {}", e)))?;
    let periodic = periodic
        .await
        .map_err(|e| FuzzError::Internal(format!("Periodic monitor panicked: {}", e)))?;

    let attack = attack?;
    let continuous = continuous?;
    let periodic = periodic?;
    info!(
        scenarios = attack.scenarios,
        iterations = attack.iterations,
        findings = continuous.findings + periodic.findings,
        "Fuzzing stopped"
    );
    Ok(())
}

async fn attack_queue(config: &FuzzConfig, stores: &RunStores, workers: usize) -> Result<AttackQueue, FuzzError> {
    let harness: Arc<dyn Harness> = Arc::new(SubprocessHarness::new(
        config.harness.program.clone(),
        config.harness.args.clone(),
        config.harness.timeout(),
    ));
    let remaining = stores.scenarios.size().await?;
    info!(scenarios = remaining, workers, "Scenario queue opened");

    Ok(AttackQueue::new(
        stores.scenarios.clone(),
        stores.results.clone(),
        stores.iteration_results.clone(),
        harness,
        workers,
    )
    .with_idle_wait(config.monitoring.idle_wait())
    .with_progress(Arc::new(AttackProgress::new(remaining))))
}

/// Token cancelled on the first Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            token.cancel();
        }
    });
    cancel
}
