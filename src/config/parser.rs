use std::path::Path;
use crate::errors::FuzzError;
use super::types::FuzzConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

pub async fn parse_config(path: &Path) -> Result<FuzzConfig, FuzzError> {
    if !path.exists() {
        return Err(FuzzError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(FuzzError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    validate_schema(&yaml)?;

    let config: FuzzConfig = serde_yaml::from_value(yaml)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let config = config.resolve_relative_to(base);

    validate_conflicts(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), FuzzError> {
    let json_str = serde_json::to_string(yaml)
        .map_err(|e| FuzzError::Config(format!("Config conversion error: {}", e)))?;
    let json_value: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| FuzzError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| FuzzError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        // Advisory only; typed deserialization rejects unknown keys and bad types.
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Reject settings the pipeline cannot run with.
pub(crate) fn validate_conflicts(config: &FuzzConfig) -> Result<(), FuzzError> {
    if config.concurrent_queues == 0 {
        return Err(FuzzError::Config("concurrent_queues must be at least 1".into()));
    }
    if config.iterations == 0 {
        return Err(FuzzError::Config("iterations must be at least 1".into()));
    }
    if config.payload_marker.is_empty() {
        return Err(FuzzError::Config("payload_marker must not be empty".into()));
    }
    if config.harness.timeout_secs == 0 {
        return Err(FuzzError::Config("harness.timeout_secs must be positive".into()));
    }
    if config.monitoring.periodic_interval_ms == 0 {
        return Err(FuzzError::Config("monitoring.periodic_interval_ms must be positive".into()));
    }
    if !config.exclude_paths.is_empty() {
        regex::Regex::new(&config.exclude_paths).map_err(|e| {
            FuzzError::Config(format!("exclude_paths is not a valid pattern: {}", e))
        })?;
    }
    if !config.only_paths_with_prefix.starts_with('/') {
        warn!(prefix = %config.only_paths_with_prefix, "Path prefix does not start with '/'; no route will match");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_conflicts_defaults_ok() {
        let config = FuzzConfig::new("/var/www");
        assert!(validate_conflicts(&config).is_ok());
    }

    #[test]
    fn test_validate_conflicts_zero_workers() {
        let mut config = FuzzConfig::new("/var/www");
        config.concurrent_queues = 0;
        assert!(validate_conflicts(&config).is_err());
    }

    #[test]
    fn test_validate_conflicts_bad_exclude_pattern() {
        let mut config = FuzzConfig::new("/var/www");
        config.exclude_paths = "(admin".into();
        let err = validate_conflicts(&config).unwrap_err();
        assert!(matches!(err, FuzzError::Config(_)));
    }

    #[test]
    fn test_validate_conflicts_empty_marker() {
        let mut config = FuzzConfig::new("/var/www");
        config.payload_marker.clear();
        assert!(validate_conflicts(&config).is_err());
    }

    #[tokio::test]
    async fn test_parse_config_applies_defaults_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "webroot: www\niterations: 4\nharness:\n  args: [\"harness.php\"]").unwrap();

        let config = parse_config(&path).await.unwrap();
        assert_eq!(config.webroot, dir.path().join("www"));
        assert_eq!(config.storage_path, dir.path().join("databases"));
        assert_eq!(config.iterations, 4);
        assert_eq!(config.concurrent_queues, 10);
        assert_eq!(config.payload_marker, "§FUZZ_PAYLOAD_ID§");
        assert_eq!(config.harness.args, vec!["harness.php".to_string()]);
        assert_eq!(config.monitoring.periodic_interval_ms, 500);
        assert_eq!(config.results_db_path(), dir.path().join("databases/iteration_results.db"));
    }

    #[tokio::test]
    async fn test_parse_config_missing_file() {
        let err = parse_config(Path::new("/nonexistent/config.yaml")).await.unwrap_err();
        assert!(matches!(err, FuzzError::Config(_)));
    }

    #[tokio::test]
    async fn test_parse_config_requires_webroot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "iterations: 2\n").unwrap();
        assert!(parse_config(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_parse_config_rejects_misspelled_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "webroot: www\niteratoins: 4\n").unwrap();
        let err = parse_config(&path).await.unwrap_err();
        assert!(matches!(err, FuzzError::Yaml(_)));
        assert!(err.to_string().contains("iteratoins"));

        std::fs::write(&path, "webroot: www\nmonitoring:\n  periodic_interval: 5\n").unwrap();
        assert!(parse_config(&path).await.is_err());
    }
}
