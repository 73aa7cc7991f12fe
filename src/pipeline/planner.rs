use tracing::info;
use crate::config::FuzzConfig;
use crate::db::ScannerStore;
use crate::errors::FuzzError;
use crate::models::{AppInfo, AttackScenario};
use crate::queue::QueueSink;
use crate::routes::{exclude_paths, limit_paths_to_prefix, PathsByFile};
use crate::strategies::StrategyDefinition;

/// What planning scheduled for one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub strategy_name: String,
    pub scenarios: usize,
    pub scanners: usize,
}

/// Every request path to attack: explicit and computed paths, narrowed by the
/// configured prefix and exclusion pattern.
pub fn compute_paths(config: &FuzzConfig, app_info: &AppInfo) -> Result<PathsByFile, FuzzError> {
    let all = app_info.all_paths();
    let limited = limit_paths_to_prefix(&all, &config.only_paths_with_prefix);
    let paths = exclude_paths(&limited, &config.exclude_paths)?;

    let total: usize = paths.values().map(Vec::len).sum();
    info!(files = paths.len(), paths = total, "Discovered paths to attack");
    Ok(paths)
}

/// Cartesian product of the strategy's payloads and the paths of each
/// webroot file.
pub fn build_scenarios(
    config: &FuzzConfig,
    app_info: &AppInfo,
    strategy: &StrategyDefinition,
    paths: &PathsByFile,
) -> Vec<AttackScenario> {
    let web_root = config.webroot.to_string_lossy().into_owned();
    let mut scenarios = Vec::new();
    for (webroot_file, file_paths) in paths {
        for payload in &strategy.scenarios {
            for path in file_paths {
                scenarios.push(AttackScenario {
                    strategy_name: strategy.strategy_name.clone(),
                    framework_handler: app_info.framework_handler.clone(),
                    web_root: web_root.clone(),
                    webroot_file: webroot_file.clone(),
                    path: path.clone(),
                    payload: payload.clone(),
                    total_iterations: config.iterations,
                    payload_marker: config.payload_marker.clone(),
                    injectable: None,
                    custom_config: config.custom_config.clone(),
                    one_param_per_payload: config.one_param_per_payload,
                });
            }
        }
    }
    scenarios
}

/// Registers every strategy's scanners and enqueues its scenarios.
pub async fn plan(
    config: &FuzzConfig,
    app_info: &AppInfo,
    strategies: &[StrategyDefinition],
    scenario_queue: &dyn QueueSink<AttackScenario>,
    scanner_store: &ScannerStore,
) -> Result<Vec<PlanSummary>, FuzzError> {
    let paths = compute_paths(config, app_info)?;
    let mut summaries = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        let scenarios = build_scenarios(config, app_info, strategy, &paths);
        let scanners = strategy.build_scanners(&config.payload_marker, &app_info.log_paths)?;

        scanner_store.register(&scanners)?;
        let summary = PlanSummary {
            strategy_name: strategy.strategy_name.clone(),
            scenarios: scenarios.len(),
            scanners: scanners.len(),
        };
        scenario_queue.put(scenarios).await?;

        info!(
            strategy = %summary.strategy_name,
            attacks = summary.scenarios,
            scanners = summary.scanners,
            "Scheduled strategy"
        );
        summaries.push(summary);
    }

    Ok(summaries)
}
