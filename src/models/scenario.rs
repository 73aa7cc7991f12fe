use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::errors::FuzzError;
use crate::harness::protocol::{HarnessConfig, HarnessOutput};
use super::content_id::{content_id, ContentId};

/// One planned attack unit: a target, a request path and a single payload.
///
/// Scenarios are never mutated once created. Per-parameter expansion derives
/// new scenarios instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackScenario {
    pub strategy_name: String,
    pub framework_handler: String,
    pub web_root: String,
    pub webroot_file: String,
    pub path: String,
    pub payload: String,
    pub total_iterations: u32,
    pub payload_marker: String,
    #[serde(default)]
    pub injectable: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub custom_config: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub one_param_per_payload: bool,
}

impl AttackScenario {
    pub fn scenario_id(&self) -> Result<ContentId, FuzzError> {
        content_id(self)
    }

    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig::for_scenario(self)
    }

    /// `(category, parameter)` pairs that are fixed by the execution baseline
    /// or listed as skip keys.
    pub fn unfuzzable_parameters(&self) -> BTreeSet<(String, String)> {
        let config = self.harness_config();
        let mut unfuzzable = BTreeSet::new();
        for (category, values) in &config.super_globals {
            for key in values.keys() {
                unfuzzable.insert((category.clone(), key.clone()));
            }
        }
        for (category, keys) in &config.fuzz_skip_keys {
            for key in keys {
                unfuzzable.insert((category.clone(), key.clone()));
            }
        }
        unfuzzable
    }

    /// Derives one scenario per fuzzable super-global parameter observed in
    /// `output`, each injecting the payload into that parameter only.
    ///
    /// Derived scenarios do not request further expansion.
    pub fn per_parameter_variants(&self, output: &HarnessOutput) -> Vec<AttackScenario> {
        if !self.one_param_per_payload {
            return Vec::new();
        }

        let unfuzzable = self.unfuzzable_parameters();
        let mut variants = Vec::new();
        for (category, params) in output.super_globals() {
            for name in params.keys() {
                if unfuzzable.contains(&(category.to_string(), name.clone())) {
                    continue;
                }
                let mut injectable = BTreeMap::new();
                injectable.insert(category.to_string(), name.clone());
                variants.push(AttackScenario {
                    injectable: Some(injectable),
                    one_param_per_payload: false,
                    ..self.clone()
                });
            }
        }
        variants
    }
}
