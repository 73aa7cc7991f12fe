use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use crate::errors::FuzzError;
use crate::scanners::{ContextScanner, FileScanner, PhraseScanner, Scanner};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerDefinition {
    pub scanner_type: String,
    pub phrase: String,
    #[serde(default = "default_is_regex")]
    pub is_regex: bool,
    pub extra: Option<BTreeMap<String, String>>,
}

fn default_is_regex() -> bool {
    true
}

impl ScannerDefinition {
    fn extra(&self, key: &str) -> Option<&str> {
        self.extra.as_ref()?.get(key).map(String::as_str)
    }

    fn phrase_scanner(&self, payload_marker: &str) -> PhraseScanner {
        PhraseScanner {
            phrase: self.phrase.clone(),
            payload_marker: payload_marker.to_string(),
            is_regex: self.is_regex,
        }
    }

    fn file_scanner(&self, payload_marker: &str, filename: &str) -> FileScanner {
        FileScanner {
            phrase: self.phrase.clone(),
            payload_marker: payload_marker.to_string(),
            is_regex: self.is_regex,
            filename: filename.to_string(),
        }
    }

    /// Concrete scanners for this definition. `LogFilesContentsScanner`
    /// fans out into one file scanner per application log.
    pub fn build(&self, payload_marker: &str, log_paths: &[String]) -> Result<Vec<Scanner>, FuzzError> {
        let scanners = match self.scanner_type.as_str() {
            "ResultOutputScanner" => vec![Scanner::ResultOutput(self.phrase_scanner(payload_marker))],
            "ResultErrorsScanner" => vec![Scanner::ResultErrors(self.phrase_scanner(payload_marker))],
            "ProcessOutputScanner" => vec![Scanner::ProcessOutput(self.phrase_scanner(payload_marker))],
            "PhraseDnsScanner" => vec![Scanner::DnsQuery(self.phrase_scanner(payload_marker))],
            "ContextResultOutputScanner" => {
                let context_location = self.extra("context_location").ok_or_else(|| {
                    FuzzError::Config("ContextResultOutputScanner requires extra.context_location".into())
                })?;
                vec![Scanner::ContextResultOutput(ContextScanner {
                    phrase: self.phrase.clone(),
                    payload_marker: payload_marker.to_string(),
                    is_regex: self.is_regex,
                    context_location: context_location.to_string(),
                })]
            }
            "PhraseFileContentsScanner" => {
                let filename = self.extra("filename").ok_or_else(|| {
                    FuzzError::Config("PhraseFileContentsScanner requires extra.filename".into())
                })?;
                vec![Scanner::FileContents(self.file_scanner(payload_marker, filename))]
            }
            "LogFilesContentsScanner" => log_paths
                .iter()
                .map(|path| Scanner::FileContents(self.file_scanner(payload_marker, path)))
                .collect(),
            other => {
                return Err(FuzzError::Config(format!("Unknown scanner type: {}", other)));
            }
        };
        Ok(scanners)
    }
}

/// One attack strategy: payloads to inject and the scanners that recognise
/// their effect.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyDefinition {
    pub strategy_name: String,
    #[serde(alias = "payloads")]
    pub scenarios: Vec<String>,
    pub scanners: Vec<ScannerDefinition>,
}

impl StrategyDefinition {
    pub fn build_scanners(&self, payload_marker: &str, log_paths: &[String]) -> Result<Vec<Scanner>, FuzzError> {
        let mut scanners = Vec::new();
        for definition in &self.scanners {
            scanners.extend(definition.build(payload_marker, log_paths)?);
        }
        Ok(scanners)
    }
}

/// Every `*.json` strategy under `strategies_dir`, sorted by file name.
/// A missing directory yields no strategies.
pub fn load_strategies(strategies_dir: &Path) -> Result<Vec<StrategyDefinition>, FuzzError> {
    let mut strategies = Vec::new();

    if !strategies_dir.exists() {
        return Ok(strategies);
    }

    let pattern = strategies_dir.join("*.json");
    let pattern_str = pattern.to_string_lossy();

    for entry in glob::glob(&pattern_str)
        .map_err(|e| FuzzError::Config(format!("Invalid glob pattern: {}", e)))?
    {
        let path = entry.map_err(|e| FuzzError::Config(format!("Glob error: {}", e)))?;
        let content = std::fs::read_to_string(&path)?;
        let definition: StrategyDefinition = serde_json::from_str(&content).map_err(|e| {
            FuzzError::Config(format!("Invalid strategy {}: {}", path.display(), e))
        })?;
        info!(
            strategy = %definition.strategy_name,
            payloads = definition.scenarios.len(),
            scanners = definition.scanners.len(),
            "Loaded attack strategy"
        );
        strategies.push(definition);
    }

    Ok(strategies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "§ID§";

    fn definition(scanner_type: &str, extra: Option<&[(&str, &str)]>) -> ScannerDefinition {
        ScannerDefinition {
            scanner_type: scanner_type.to_string(),
            phrase: format!("alert({})", MARKER),
            is_regex: false,
            extra: extra.map(|pairs| {
                pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
            }),
        }
    }

    #[test]
    fn test_log_files_scanner_fans_out_per_log() {
        let logs = vec!["/var/log/a.log".to_string(), "/var/log/b.log".to_string()];
        let scanners = definition("LogFilesContentsScanner", None).build(MARKER, &logs).unwrap();
        assert_eq!(scanners.len(), 2);
        assert_eq!(scanners[1].filename(), Some("/var/log/b.log"));
        assert!(scanners.iter().all(|s| s.kind() == "file_contents"));
    }

    #[test]
    fn test_context_scanner_requires_location() {
        let err = definition("ContextResultOutputScanner", None).build(MARKER, &[]).unwrap_err();
        assert!(matches!(err, FuzzError::Config(_)));

        let scanners = definition("ContextResultOutputScanner", Some(&[("context_location", "script.text")]))
            .build(MARKER, &[])
            .unwrap();
        assert_eq!(scanners[0].kind(), "context_result_output");
    }

    #[test]
    fn test_unknown_scanner_type_is_config_error() {
        let err = definition("TelepathyScanner", None).build(MARKER, &[]).unwrap_err();
        assert!(err.to_string().contains("TelepathyScanner"));
    }

    #[test]
    fn test_load_strategies_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rxss.json"),
            r#"{
                "strategy_name": "ReflectedXss",
                "scenarios": ["<b>§ID§</b>"],
                "scanners": [{"scanner_type": "ResultOutputScanner", "phrase": "<b>§ID§</b>"}]
            }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let strategies = load_strategies(dir.path()).unwrap();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].strategy_name, "ReflectedXss");
        assert!(strategies[0].scanners[0].is_regex);
    }

    #[test]
    fn test_load_strategies_missing_directory() {
        let strategies = load_strategies(Path::new("/nonexistent/strategies")).unwrap();
        assert!(strategies.is_empty());
    }
}
