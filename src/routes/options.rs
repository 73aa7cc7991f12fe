use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Values a placeholder may take during expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteOption {
    Values(Vec<String>),
    /// Keyed by controller name, used for `action`.
    PerController(BTreeMap<String, Vec<String>>),
}

impl RouteOption {
    /// All candidate values. A per-controller map that was not narrowed to a
    /// single controller yields the union of its lists.
    pub fn values(&self) -> Vec<String> {
        match self {
            RouteOption::Values(values) => values.clone(),
            RouteOption::PerController(map) => {
                let mut out: Vec<String> = Vec::new();
                for value in map.values().flatten() {
                    if !out.contains(value) {
                        out.push(value.clone());
                    }
                }
                out
            }
        }
    }

    pub fn for_controller(&self, controller: &str) -> Vec<String> {
        match self {
            RouteOption::Values(values) => values.clone(),
            RouteOption::PerController(map) => map.get(controller).cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParam {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

/// controller -> action -> parameter list
pub type ControllerSpecs = BTreeMap<String, BTreeMap<String, Vec<ActionParam>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    #[serde(flatten)]
    pub groups: BTreeMap<String, RouteOption>,
    #[serde(default)]
    pub controller_specs: ControllerSpecs,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(mut self, name: &str, values: &[&str]) -> Self {
        self.groups.insert(
            name.to_string(),
            RouteOption::Values(values.iter().map(|v| v.to_string()).collect()),
        );
        self
    }

    pub fn with_actions(mut self, actions: &[(&str, &[&str])]) -> Self {
        let map = actions
            .iter()
            .map(|(controller, list)| {
                (controller.to_string(), list.iter().map(|a| a.to_string()).collect())
            })
            .collect();
        self.groups.insert("action".to_string(), RouteOption::PerController(map));
        self
    }

    pub fn get(&self, name: &str) -> Option<&RouteOption> {
        self.groups.get(name)
    }

    /// Copy of these options where `action` only offers the actions of `controller`.
    pub fn narrowed_to(&self, controller: &str) -> Self {
        let mut narrowed = self.clone();
        if let Some(action) = self.groups.get("action") {
            narrowed.groups.insert(
                "action".to_string(),
                RouteOption::Values(action.for_controller(controller)),
            );
        }
        narrowed
    }

    /// Controller specs used for pruning. Without explicit specs every known
    /// controller/action pair is accepted with no required arguments.
    pub fn effective_specs(&self) -> ControllerSpecs {
        if !self.controller_specs.is_empty() {
            return self.controller_specs.clone();
        }
        let mut specs = ControllerSpecs::new();
        if let Some(RouteOption::PerController(map)) = self.groups.get("action") {
            for (controller, actions) in map {
                let entry = specs.entry(controller.clone()).or_default();
                for action in actions {
                    entry.insert(action.clone(), Vec::new());
                }
            }
        }
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_mixed_groups() {
        let options: RouteOptions = serde_json::from_value(json!({
            "controller": ["Users", "Posts"],
            "action": {"Users": ["login"], "Posts": ["index", "view"]},
            "controller_specs": {"Posts": {"view": [{"name": "id", "optional": false}]}}
        }))
        .unwrap();
        assert_eq!(options.get("controller").unwrap().values(), vec!["Users", "Posts"]);
        assert_eq!(options.get("action").unwrap().values(), vec!["index", "view", "login"]);
        assert_eq!(options.controller_specs["Posts"]["view"].len(), 1);
    }

    #[test]
    fn test_narrowing_unknown_controller_is_empty() {
        let options = RouteOptions::new().with_actions(&[("Users", &["login"])]);
        let narrowed = options.narrowed_to("Ghost");
        assert!(narrowed.get("action").unwrap().values().is_empty());
    }

    #[test]
    fn test_effective_specs_derived_from_actions() {
        let options = RouteOptions::new().with_actions(&[("Users", &["login", "logout"])]);
        let specs = options.effective_specs();
        assert!(specs["Users"]["logout"].is_empty());
    }
}
