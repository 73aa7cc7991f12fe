//! JSON documents exchanged with the execution harness.
//!
//! The harness reads one [`HarnessConfig`] on stdin and answers with one
//! [`HarnessOutput`] on stdout. Field names follow the harness's wire format.

use std::collections::BTreeMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use crate::models::AttackScenario;

/// `_SERVER` entries every execution starts from. They are fixed, so
/// per-parameter expansion never targets them.
pub const BASELINE_SERVER: [(&str, &str); 2] = [
    ("HTTP_HOST", "127.0.0.1"),
    ("HTTP_SEC_FETCH_SITE", "same-origin"),
];

/// `_SERVER` keys the harness must never fuzz.
pub const SKIP_SERVER_KEYS: [&str; 3] = [
    "HTTP_CONTENT_ENCODING",
    "HTTP_X_HTTP_METHOD_OVERRIDE",
    "HTTP_AUTHORIZATION",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub framework_handler: String,
    pub web_root: String,
    pub webroot_file: String,
    pub strategy_name: String,
    pub path: String,
    pub super_globals: BTreeMap<String, BTreeMap<String, String>>,
    pub payloads: Vec<String>,
    pub global_targets: Vec<String>,
    pub global_exclude: Vec<String>,
    pub fuzz_skip_keys: BTreeMap<String, Vec<String>>,
    #[serde(rename = "oneParamPerPayload")]
    pub one_param_per_payload: bool,
    pub iterations: u32,
    #[serde(rename = "PAYLOAD_GUID_phrase")]
    pub payload_marker: String,
    pub injectable: Option<BTreeMap<String, String>>,
    /// Framework-specific settings the core passes through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HarnessConfig {
    /// Builds the harness configuration for one scenario, applying its custom
    /// overrides on top of the defaults.
    pub fn for_scenario(scenario: &AttackScenario) -> Self {
        let defaults = Self::defaults(scenario);
        match &scenario.custom_config {
            Some(overrides) if !overrides.is_empty() => defaults.with_overrides(overrides),
            _ => defaults,
        }
    }

    fn defaults(scenario: &AttackScenario) -> Self {
        let mut super_globals = BTreeMap::new();
        super_globals.insert(
            "_SERVER".to_string(),
            BASELINE_SERVER
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );

        let mut fuzz_skip_keys = BTreeMap::new();
        fuzz_skip_keys.insert(
            "_SERVER".to_string(),
            SKIP_SERVER_KEYS.iter().map(|k| k.to_string()).collect(),
        );

        Self {
            framework_handler: scenario.framework_handler.clone(),
            web_root: scenario.web_root.clone(),
            webroot_file: scenario.webroot_file.clone(),
            strategy_name: scenario.strategy_name.clone(),
            path: scenario.path.clone(),
            super_globals,
            payloads: vec![scenario.payload.clone()],
            global_targets: Vec::new(),
            global_exclude: Vec::new(),
            fuzz_skip_keys,
            one_param_per_payload: scenario.one_param_per_payload,
            iterations: scenario.total_iterations,
            payload_marker: scenario.payload_marker.clone(),
            injectable: scenario.injectable.clone(),
            extra: Map::new(),
        }
    }

    fn with_overrides(self, overrides: &BTreeMap<String, Value>) -> Self {
        let mut merged = match serde_json::to_value(&self) {
            Ok(Value::Object(map)) => map,
            _ => return self,
        };

        for (key, value) in overrides {
            match merged.get(key) {
                Some(default) if !default.is_null() && !same_kind(default, value) => {
                    warn!(
                        key = %key,
                        expected = kind_name(default),
                        found = kind_name(value),
                        "Custom config value has the wrong type, keeping default"
                    );
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }

        match serde_json::from_value(Value::Object(merged)) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Custom config could not be applied, keeping defaults");
                self
            }
        }
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Names of the super-global categories reported by the harness, in report order.
pub const SUPER_GLOBAL_NAMES: [&str; 6] = ["_GET", "_POST", "_REQUEST", "_COOKIE", "_FILES", "_SERVER"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessOutput {
    pub first_http_line: Option<String>,
    pub method: String,
    pub path: String,
    #[serde(default, deserialize_with = "lenient_map")]
    pub headers: BTreeMap<String, Value>,
    #[serde(rename = "_GET", default, deserialize_with = "lenient_map")]
    pub get: BTreeMap<String, Value>,
    #[serde(rename = "_POST", default, deserialize_with = "lenient_map")]
    pub post: BTreeMap<String, Value>,
    #[serde(rename = "_REQUEST", default, deserialize_with = "lenient_map")]
    pub request: BTreeMap<String, Value>,
    #[serde(rename = "_COOKIE", default, deserialize_with = "lenient_map")]
    pub cookie: BTreeMap<String, Value>,
    #[serde(rename = "_FILES", default, deserialize_with = "lenient_map")]
    pub files: BTreeMap<String, Value>,
    #[serde(rename = "_SERVER", default, deserialize_with = "lenient_map")]
    pub server: BTreeMap<String, Value>,
    /// Raw response body.
    pub output: String,
    #[serde(rename = "PAYLOAD_GUIDs", default)]
    pub payload_ids: Vec<String>,
    #[serde(default)]
    pub exec_time: f64,
}

impl HarnessOutput {
    pub fn super_global(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        match name {
            "_GET" => Some(&self.get),
            "_POST" => Some(&self.post),
            "_REQUEST" => Some(&self.request),
            "_COOKIE" => Some(&self.cookie),
            "_FILES" => Some(&self.files),
            "_SERVER" => Some(&self.server),
            _ => None,
        }
    }

    pub fn super_globals(&self) -> impl Iterator<Item = (&'static str, &BTreeMap<String, Value>)> {
        SUPER_GLOBAL_NAMES
            .into_iter()
            .filter_map(move |name| self.super_global(name).map(|map| (name, map)))
    }
}

/// PHP encodes an empty associative array as `[]` and a list as a JSON array;
/// both are folded into a string-keyed map.
fn lenient_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => BTreeMap::new(),
    })
}
