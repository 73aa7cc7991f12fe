use std::path::Path;
use tracing::info;
use crate::config;
use crate::errors::FuzzError;
use crate::models::AppInfo;
use crate::pipeline::plan;
use crate::strategies::load_strategies;
use super::stores::RunStores;

pub async fn handle_plan(config_path: &str) -> Result<(), FuzzError> {
    let config = config::parse_config(Path::new(config_path)).await?;
    let strategies = load_strategies(&config.strategies_dir)?;
    if strategies.is_empty() {
        return Err(FuzzError::Config(format!(
            "No attack strategies found in {}",
            config.strategies_dir.display()
        )));
    }
    let app_info = AppInfo::load(&config.app_info).await?;
    let stores = RunStores::open(&config)?;

    let summaries = plan(
        &config,
        &app_info,
        &strategies,
        stores.scenarios.as_ref(),
        &stores.scanners,
    )
    .await?;

    let scenarios: usize = summaries.iter().map(|s| s.scenarios).sum();
    let scanners: usize = summaries.iter().map(|s| s.scanners).sum();
    info!(strategies = summaries.len(), scenarios, scanners, "Planning complete");
    Ok(())
}
