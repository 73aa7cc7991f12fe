use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PAYLOAD_MARKER: &str = "§FUZZ_PAYLOAD_ID§";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FuzzConfig {
    /// Web root of the instrumented application.
    pub webroot: PathBuf,
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_concurrent_queues")]
    pub concurrent_queues: usize,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_prefix")]
    pub only_paths_with_prefix: String,
    #[serde(default)]
    pub exclude_paths: String,
    #[serde(default = "default_payload_marker")]
    pub payload_marker: String,
    #[serde(default = "default_strategies_dir")]
    pub strategies_dir: PathBuf,
    #[serde(default = "default_app_info")]
    pub app_info: PathBuf,
    #[serde(default)]
    pub one_param_per_payload: bool,
    /// Harness overrides applied to every planned scenario.
    pub custom_config: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub harness: HarnessSettings,
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    #[serde(default)]
    pub queue: QueueSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    #[serde(default = "default_harness_program")]
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_harness_timeout")]
    pub timeout_secs: u64,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            program: default_harness_program(),
            args: Vec::new(),
            timeout_secs: default_harness_timeout(),
        }
    }
}

impl HarnessSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringSettings {
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_ms: u64,
    #[serde(default = "default_idle_wait")]
    pub idle_wait_ms: u64,
    pub dns_listen: Option<SocketAddr>,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            periodic_interval_ms: default_periodic_interval(),
            idle_wait_ms: default_idle_wait(),
            dns_listen: None,
        }
    }
}

impl MonitoringSettings {
    pub fn periodic_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_interval_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSettings {
    #[serde(default = "default_queue_cache")]
    pub batch_size: usize,
    #[serde(default = "default_queue_cache")]
    pub recent_cache_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { batch_size: default_queue_cache(), recent_cache_size: default_queue_cache() }
    }
}

/// Store files, all under `storage_path`.
impl FuzzConfig {
    pub fn new(webroot: impl Into<PathBuf>) -> Self {
        Self {
            webroot: webroot.into(),
            storage_path: default_storage_path(),
            concurrent_queues: default_concurrent_queues(),
            iterations: default_iterations(),
            only_paths_with_prefix: default_prefix(),
            exclude_paths: String::new(),
            payload_marker: default_payload_marker(),
            strategies_dir: default_strategies_dir(),
            app_info: default_app_info(),
            one_param_per_payload: false,
            custom_config: None,
            harness: HarnessSettings::default(),
            monitoring: MonitoringSettings::default(),
            queue: QueueSettings::default(),
        }
    }

    pub fn scenarios_queue_path(&self) -> PathBuf {
        self.storage_path.join("scenarios.queue")
    }

    pub fn results_queue_path(&self) -> PathBuf {
        self.storage_path.join("iteration_results.queue")
    }

    pub fn results_db_path(&self) -> PathBuf {
        self.storage_path.join("iteration_results.db")
    }

    pub fn monitors_db_path(&self) -> PathBuf {
        self.storage_path.join("monitors.db")
    }

    pub fn registry_db_path(&self) -> PathBuf {
        self.storage_path.join("registry.db")
    }

    /// Relative paths are resolved against `base` (the config file's directory).
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        for path in [
            &mut self.webroot,
            &mut self.storage_path,
            &mut self.strategies_dir,
            &mut self.app_info,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("databases")
}

fn default_concurrent_queues() -> usize {
    10
}

fn default_iterations() -> u32 {
    32
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_payload_marker() -> String {
    DEFAULT_PAYLOAD_MARKER.to_string()
}

fn default_strategies_dir() -> PathBuf {
    PathBuf::from("strategies")
}

fn default_app_info() -> PathBuf {
    PathBuf::from("app_info.json")
}

fn default_harness_program() -> PathBuf {
    PathBuf::from("php")
}

fn default_harness_timeout() -> u64 {
    10
}

fn default_periodic_interval() -> u64 {
    500
}

fn default_idle_wait() -> u64 {
    1000
}

fn default_queue_cache() -> usize {
    512
}
