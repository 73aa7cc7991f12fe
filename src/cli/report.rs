use std::path::{Path, PathBuf};
use crate::config;
use crate::errors::FuzzError;
use crate::pipeline::VulnerabilitiesRegistry;
use super::commands::ReportArgs;
use super::stores::RunStores;

pub async fn handle_report(config_path: &str, args: ReportArgs) -> Result<(), FuzzError> {
    let config = config::parse_config(Path::new(config_path)).await?;
    let stores = RunStores::open(&config)?;
    let registry = VulnerabilitiesRegistry::new(
        stores.vulnerabilities.clone(),
        stores.iteration_results.clone(),
        stores.scanners.clone(),
    );
    let written = registry.save_to_file(&PathBuf::from(&args.output)).await?;
    println!("{} unique vulnerabilities written to {}", written, args.output);
    Ok(())
}
