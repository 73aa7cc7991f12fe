use std::path::Path;
use crate::config;
use crate::errors::FuzzError;
use crate::pipeline::Monitoring;
use super::attack::cancel_on_ctrl_c;
use super::commands::DrainArgs;
use super::stores::RunStores;

fn monitoring(config: &config::FuzzConfig, stores: &RunStores) -> Monitoring {
    Monitoring::new(
        stores.results.clone(),
        stores.scenarios.clone(),
        stores.scanners.clone(),
        stores.vulnerabilities.clone(),
        config.monitoring.clone(),
    )
}

pub async fn handle_monitor(config_path: &str, args: DrainArgs) -> Result<(), FuzzError> {
    let config = config::parse_config(Path::new(config_path)).await?;
    let stores = RunStores::open(&config)?;
    monitoring(&config, &stores)
        .with_exit_when_idle(args.exit_when_drained)
        .run_continuous(cancel_on_ctrl_c())
        .await?;
    Ok(())
}

pub async fn handle_periodic(config_path: &str) -> Result<(), FuzzError> {
    let config = config::parse_config(Path::new(config_path)).await?;
    let stores = RunStores::open(&config)?;
    monitoring(&config, &stores).run_periodic(cancel_on_ctrl_c()).await?;
    Ok(())
}
