use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use crate::errors::FuzzError;
use crate::harness::protocol::SUPER_GLOBAL_NAMES;
use crate::models::{IterationResult, Vulnerability};
use crate::queue::{IterationResultLookup, ScannerLookup, VulnerabilitySource};
use crate::scanners::Scanner;

/// A stored finding joined with the iteration and scanner that produced it.
#[derive(Debug, Clone)]
pub struct FullVulnerability {
    pub vulnerability: Vulnerability,
    pub iteration_result: Option<IterationResult>,
    pub scanner: Option<Scanner>,
    /// Where the payload sits in the structured harness output, `{}` when it
    /// could not be located.
    pub vulnerability_location: Value,
}

impl FullVulnerability {
    pub fn strategy_name(&self) -> Option<&str> {
        self.iteration_result.as_ref().map(|ir| ir.scenario.strategy_name.as_str())
    }

    /// Payload text with the finding's id substituted back in.
    pub fn payload(&self) -> Option<String> {
        self.iteration_result
            .as_ref()
            .map(|ir| ir.payload_with_id(self.vulnerability.payload_id.as_deref()))
    }

    /// Two findings with the same key are the same vulnerability, whatever
    /// payload instance or iteration revealed them.
    pub fn dedup_key(&self) -> (Option<String>, String, Option<String>) {
        (
            self.strategy_name().map(str::to_string),
            self.vulnerability_location.to_string(),
            self.iteration_result.as_ref().map(|ir| ir.deduplicable_path()),
        )
    }
}

impl PartialEq for FullVulnerability {
    fn eq(&self, other: &Self) -> bool {
        self.dedup_key() == other.dedup_key()
    }
}

impl Eq for FullVulnerability {}

impl std::hash::Hash for FullVulnerability {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.dedup_key().hash(state);
    }
}

/// One entry of the results file.
#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub strategy_name: Option<String>,
    pub payload: Option<String>,
    pub detection_result: String,
    pub context_location: Option<String>,
    pub vulnerability_location: Value,
    pub vulnerability_id: usize,
    pub path: Option<String>,
    pub method: Option<String>,
    pub superglobal: Map<String, Value>,
}

impl ReportEntry {
    fn new(index: usize, full: &FullVulnerability) -> Self {
        let ir = full.iteration_result.as_ref();
        let superglobal = SUPER_GLOBAL_NAMES
            .iter()
            .map(|name| {
                let value = ir
                    .and_then(|ir| ir.output.super_global(name))
                    .map(|map| json!(map))
                    .unwrap_or(Value::Null);
                (name.to_string(), value)
            })
            .collect();

        Self {
            strategy_name: full.strategy_name().map(str::to_string),
            payload: full.payload(),
            detection_result: full.vulnerability.detection_result.clone(),
            context_location: full.vulnerability.context_location.clone(),
            vulnerability_location: full.vulnerability_location.clone(),
            vulnerability_id: index,
            path: ir.map(|ir| ir.output.path.clone()),
            method: ir.map(|ir| ir.output.method.clone()),
            superglobal,
        }
    }
}

/// Joins stored findings back to their iterations and scanners.
pub struct VulnerabilitiesRegistry {
    vulnerabilities: Arc<dyn VulnerabilitySource>,
    iteration_results: Arc<dyn IterationResultLookup>,
    scanners: Arc<dyn ScannerLookup>,
}

impl VulnerabilitiesRegistry {
    pub fn new(
        vulnerabilities: Arc<dyn VulnerabilitySource>,
        iteration_results: Arc<dyn IterationResultLookup>,
        scanners: Arc<dyn ScannerLookup>,
    ) -> Self {
        Self { vulnerabilities, iteration_results, scanners }
    }

    /// The iteration a finding came from. The stored iteration id wins unless
    /// that iteration never emitted the finding's payload id, in which case
    /// the payload id index is consulted. Unresolved joins are logged and the
    /// finding is kept without its iteration.
    async fn iteration_result(&self, vulnerability: &Vulnerability) -> Result<Option<IterationResult>, FuzzError> {
        let joined = self.lookup_iteration_result(vulnerability).await?;
        if joined.is_none() {
            warn!(
                detection = %vulnerability.detection_result,
                scanner_id = %vulnerability.scanner_id,
                iteration_id = ?vulnerability.iteration_result_id,
                payload_id = ?vulnerability.payload_id,
                "Cannot join vulnerability with any iteration result"
            );
        }
        Ok(joined)
    }

    async fn lookup_iteration_result(&self, vulnerability: &Vulnerability) -> Result<Option<IterationResult>, FuzzError> {
        let payload_id = vulnerability.payload_id.as_deref();

        if let Some(id) = vulnerability.iteration_result_id {
            let ir = self.iteration_results.get(id).await?;
            return match (ir, payload_id) {
                (Some(ir), None) => Ok(Some(ir)),
                (Some(ir), Some(pid)) if ir.has_payload_id(pid) => Ok(Some(ir)),
                (_, Some(pid)) => self.iteration_results.get_by_payload_id(pid).await,
                (None, None) => Ok(None),
            };
        }

        match payload_id {
            Some(pid) => self.iteration_results.get_by_payload_id(pid).await,
            None => Ok(None),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<FullVulnerability>, FuzzError> {
        let vulnerabilities = self.vulnerabilities.list_all().await?;
        let mut full = Vec::with_capacity(vulnerabilities.len());

        for vulnerability in vulnerabilities {
            let iteration_result = self.iteration_result(&vulnerability).await?;
            let scanner = self.scanners.get(vulnerability.scanner_id).await?;
            let vulnerability_location =
                find_vulnerability_location(iteration_result.as_ref(), vulnerability.payload_id.as_deref());
            full.push(FullVulnerability { vulnerability, iteration_result, scanner, vulnerability_location });
        }

        Ok(full)
    }

    /// First occurrence of every dedup key, in storage order.
    pub async fn list_unique(&self) -> Result<Vec<FullVulnerability>, FuzzError> {
        let mut seen = HashSet::new();
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|v| seen.insert(v.dedup_key()))
            .collect())
    }

    /// Writes the unique findings as an indented JSON array. Returns how many
    /// were written.
    pub async fn save_to_file(&self, path: &Path) -> Result<usize, FuzzError> {
        let unique = self.list_unique().await?;
        let entries: Vec<ReportEntry> = unique
            .iter()
            .enumerate()
            .map(|(index, full)| ReportEntry::new(index, full))
            .collect();

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        entries.serialize(&mut serializer)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, out).await?;
        info!(path = %path.display(), findings = entries.len(), "Results saved");
        Ok(entries.len())
    }
}

/// Location of the payload inside the iteration's structured output (body
/// excluded). The request path is URL-decoded first.
pub fn find_vulnerability_location(iteration_result: Option<&IterationResult>, payload_id: Option<&str>) -> Value {
    let Some(ir) = iteration_result else {
        return json!({});
    };
    let target = ir.payload_with_id(payload_id);
    let output = &ir.output;

    let path = urlencoding::decode(&output.path.replace('+', " "))
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| output.path.clone());

    let mut fields: Vec<(&str, Value)> = vec![
        ("first_http_line", json!(output.first_http_line)),
        ("method", json!(output.method)),
        ("path", json!(path)),
        ("headers", json!(output.headers)),
    ];
    for (name, map) in output.super_globals() {
        fields.push((name, json!(map)));
    }
    fields.push(("PAYLOAD_GUIDs", json!(output.payload_ids)));
    fields.push(("exec_time", json!(output.exec_time)));

    for (key, value) in fields {
        if key.contains(target.as_str()) {
            return json!({ key: value });
        }
        if let Some(location) = json_location(&value, &target) {
            return json!({ key: location });
        }
    }
    json!({})
}

/// Shortest path to the first string (or object key) containing `target`.
fn json_location(value: &Value, target: &str) -> Option<Value> {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if key.contains(target) {
                    return Some(json!({ key.clone(): inner.clone() }));
                }
                if let Some(location) = json_location(inner, target) {
                    return Some(json!({ key.clone(): location }));
                }
            }
            None
        }
        Value::Array(items) => items
            .iter()
            .find_map(|item| json_location(item, target))
            .map(|location| json!([location])),
        Value::String(s) if s.contains(target) => Some(Value::String(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::HarnessOutput;
    use crate::models::{AttackScenario, ContentId};
    use crate::queue::{MemoryVulnerabilities, QueueSink, VulnerabilitySink};
    use crate::scanners::PhraseScanner;
    use async_trait::async_trait;

    const MARKER: &str = "§ID§";

    struct NoScanners;

    #[async_trait]
    impl ScannerLookup for NoScanners {
        async fn get(&self, _id: ContentId) -> Result<Option<Scanner>, FuzzError> {
            Ok(None)
        }
    }

    fn iteration(path: &str, observed_path: &str, payload_ids: &[&str], query: Value) -> IterationResult {
        let output: HarnessOutput = serde_json::from_value(json!({
            "method": "GET",
            "path": observed_path,
            "_GET": query,
            "output": "<html></html>",
            "PAYLOAD_GUIDs": payload_ids,
        }))
        .unwrap();
        IterationResult {
            scenario: AttackScenario {
                strategy_name: "ReflectedXss".into(),
                framework_handler: "h".into(),
                web_root: "/w".into(),
                webroot_file: "/w/index.php".into(),
                path: path.into(),
                payload: format!("<b>{}</b>", MARKER),
                total_iterations: 1,
                payload_marker: MARKER.into(),
                injectable: None,
                custom_config: None,
                one_param_per_payload: false,
            },
            iteration: 0,
            output,
            stderr: String::new(),
        }
    }

    fn scanner_id() -> ContentId {
        Scanner::ResultOutput(PhraseScanner {
            phrase: "x".into(),
            payload_marker: MARKER.into(),
            is_regex: false,
        })
        .scanner_id()
        .unwrap()
    }

    async fn registry_with(results: Vec<IterationResult>, vulns: Vec<Vulnerability>) -> VulnerabilitiesRegistry {
        let memory = Arc::new(MemoryVulnerabilities::new());
        memory.put(results).await.unwrap();
        memory.add(vulns).await.unwrap();
        VulnerabilitiesRegistry::new(memory.clone(), memory, Arc::new(NoScanners))
    }

    #[test]
    fn test_location_walks_into_super_globals() {
        let ir = iteration("/a/", "/a/", &["11"], json!({"q": "x<b>11</b>y", "n": "1"}));
        let location = find_vulnerability_location(Some(&ir), Some("11"));
        assert_eq!(location, json!({"_GET": {"q": "x<b>11</b>y"}}));
    }

    #[test]
    fn test_location_matches_keys_and_decoded_path() {
        let ir = iteration("/a/", "/a/%3Cb%3E5%3C/b%3E+x", &[], json!({}));
        assert_eq!(
            find_vulnerability_location(Some(&ir), Some("5")),
            json!({"path": "/a/<b>5</b> x"})
        );

        let ir = iteration("/a/", "/a/", &[], json!({"<b>6</b>": "v"}));
        assert_eq!(
            find_vulnerability_location(Some(&ir), Some("6")),
            json!({"_GET": {"<b>6</b>": "v"}})
        );
    }

    #[test]
    fn test_location_missing_is_empty_object() {
        let ir = iteration("/a/", "/a/", &[], json!({"q": "plain"}));
        assert_eq!(find_vulnerability_location(Some(&ir), Some("9")), json!({}));
        assert_eq!(find_vulnerability_location(None, None), json!({}));
    }

    #[test]
    fn test_json_location_lists_wrap_first_match() {
        let value = json!({"a": [1, "no", {"b": "has TARGET"}]});
        assert_eq!(json_location(&value, "TARGET"), Some(json!({"a": [{"b": "has TARGET"}]})));
    }

    #[tokio::test]
    async fn test_join_falls_back_to_payload_id() {
        let first = iteration("/a/", "/a/", &["1"], json!({"q": "<b>1</b>"}));
        let second = iteration("/b/", "/b/", &["2"], json!({"q": "<b>2</b>"}));
        let first_id = first.iteration_id().unwrap();

        // stored against the first iteration, but carries the second's id
        let vuln = Vulnerability::new("<b>2</b>".into(), Some("2".into()), None, scanner_id(), Some(first_id));
        let registry = registry_with(vec![first, second], vec![vuln]).await;

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        let ir = all[0].iteration_result.as_ref().unwrap();
        assert_eq!(ir.scenario.path, "/b/");
        assert_eq!(all[0].payload().as_deref(), Some("<b>2</b>"));
    }

    #[tokio::test]
    async fn test_unjoinable_finding_is_kept() {
        let vuln = Vulnerability::new("root:x:0:0".into(), None, None, scanner_id(), None);
        let registry = registry_with(Vec::new(), vec![vuln]).await;

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].iteration_result.is_none());
        assert_eq!(all[0].vulnerability_location, json!({}));
    }

    #[tokio::test]
    async fn test_dangling_iteration_and_unknown_payload_id_are_kept() {
        let gone = iteration("/gone/", "/gone/", &["5"], json!({})).iteration_id().unwrap();
        let vulns = vec![
            Vulnerability::new("<b>x</b>".into(), None, None, scanner_id(), Some(gone)),
            Vulnerability::new("<b>8</b>".into(), Some("8".into()), None, scanner_id(), None),
        ];
        let registry = registry_with(Vec::new(), vulns).await;

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|full| full.iteration_result.is_none()));
    }

    #[tokio::test]
    async fn test_list_unique_ignores_payload_and_iteration() {
        let a = iteration("/users/view/", "/users/view/", &["1"], json!({"q": "<b>1</b>"}));
        let b = iteration("/users/view/", "/users/view/", &["2"], json!({"q": "<b>2</b>"}));
        let c = iteration("/posts/", "/posts/", &["3"], json!({"q": "<b>3</b>"}));
        let vulns = vec![
            Vulnerability::new("<b>1</b>".into(), None, None, scanner_id(), Some(a.iteration_id().unwrap())),
            Vulnerability::new("<b>2</b>".into(), None, None, scanner_id(), Some(b.iteration_id().unwrap())),
            Vulnerability::new("<b>3</b>".into(), None, None, scanner_id(), Some(c.iteration_id().unwrap())),
        ];
        let registry = registry_with(vec![a, b, c], vulns).await;

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], all[1]);
        assert_ne!(all[0], all[2]);
        assert_eq!(registry.list_unique().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_to_file_writes_indexed_entries() {
        let ir = iteration("/a/", "/a/", &["7"], json!({"q": "<b>7</b>"}));
        let joined = Vulnerability::new("<b>7</b>".into(), Some("7".into()), None, scanner_id(), Some(ir.iteration_id().unwrap()));
        let orphan = Vulnerability::new("uid=0(root)".into(), None, None, scanner_id(), None);
        let registry = registry_with(vec![ir], vec![joined, orphan]).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/results.json");
        assert_eq!(registry.save_to_file(&path).await.unwrap(), 2);

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entries = saved.as_array().unwrap();
        assert_eq!(entries[0]["vulnerability_id"], 0);
        assert_eq!(entries[0]["strategy_name"], "ReflectedXss");
        assert_eq!(entries[0]["payload"], "<b>7</b>");
        assert_eq!(entries[0]["superglobal"]["_GET"]["q"], "<b>7</b>");
        assert_eq!(entries[1]["vulnerability_id"], 1);
        assert_eq!(entries[1]["path"], Value::Null);
        assert_eq!(entries[1]["superglobal"]["_SERVER"], Value::Null);
    }
}
