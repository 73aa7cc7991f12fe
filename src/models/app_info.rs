use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::errors::FuzzError;
use crate::routes::{PathsByFile, RouteComputer, RouteOptions};

/// Application facts produced by the external discovery step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub framework_handler: String,
    #[serde(default)]
    pub log_paths: Vec<String>,
    /// Explicit request paths per webroot file.
    #[serde(default)]
    pub paths: PathsByFile,
    /// Route patterns per webroot file, expanded with `route_options`.
    #[serde(default)]
    pub routes: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub route_options: RouteOptions,
}

impl AppInfo {
    pub async fn load(path: &Path) -> Result<Self, FuzzError> {
        if !path.exists() {
            return Err(FuzzError::Config(format!(
                "Application info not found: {}",
                path.display()
            )));
        }
        let content = tokio::fs::read_to_string(path).await?;
        let app_info: AppInfo = serde_json::from_str(&content)?;
        info!(
            framework_handler = %app_info.framework_handler,
            files = app_info.paths.len() + app_info.routes.len(),
            log_paths = app_info.log_paths.len(),
            "Loaded application info"
        );
        Ok(app_info)
    }

    /// Explicit paths merged with the paths computed from route patterns.
    pub fn all_paths(&self) -> PathsByFile {
        let mut all = self.paths.clone();
        if self.routes.is_empty() {
            return all;
        }
        let computer = RouteComputer::new(self.route_options.clone());
        for (file, patterns) in &self.routes {
            let entry = all.entry(file.clone()).or_default();
            for path in computer.parse_all(patterns.as_slice()) {
                if !entry.contains(&path) {
                    entry.push(path);
                }
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_paths_merges_routes() {
        let app_info: AppInfo = serde_json::from_value(json!({
            "framework_handler": "PhpAppHandler",
            "paths": {"/srv/webroot/index.php": ["/pages/home/", "/Users/login/"]},
            "routes": {
                "/srv/webroot/index.php": ["#^/(?:(?P<controller>[^/]+))/(?:(?P<action>[^/]+))[/]*$#"]
            },
            "route_options": {
                "controller": ["Users"],
                "action": {"Users": ["login", "logout"]}
            }
        }))
        .unwrap();

        let paths = app_info.all_paths();
        assert_eq!(
            paths["/srv/webroot/index.php"],
            vec!["/pages/home/", "/Users/login/", "/Users/logout/"]
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppInfo::load(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, FuzzError::Config(_)));
    }
}
