use serde::{Deserialize, Serialize};
use crate::errors::FuzzError;
use crate::harness::protocol::HarnessOutput;
use super::content_id::{content_id, ContentId};
use super::scenario::AttackScenario;

/// One concrete execution of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub scenario: AttackScenario,
    pub iteration: u32,
    pub output: HarnessOutput,
    #[serde(default)]
    pub stderr: String,
}

impl IterationResult {
    pub fn iteration_id(&self) -> Result<ContentId, FuzzError> {
        content_id(self)
    }

    /// Longest segment-wise prefix shared by the requested and the observed
    /// path. A trailing empty segment marks where the two diverged, and is
    /// only added while both paths still have a segment there.
    pub fn deduplicable_path(&self) -> String {
        let requested: Vec<&str> = self.scenario.path.split('/').collect();
        let mut shared: Vec<&str> = Vec::new();
        for (index, segment) in self.output.path.split('/').enumerate() {
            match requested.get(index) {
                Some(other) if *other == segment => shared.push(segment),
                Some(_) => {
                    if shared.last() != Some(&"") {
                        shared.push("");
                    }
                    break;
                }
                None => break,
            }
        }
        shared.join("/")
    }

    /// The scenario payload with the marker replaced by a concrete id, or the
    /// raw payload when no id is known.
    pub fn payload_with_id(&self, payload_id: Option<&str>) -> String {
        match payload_id {
            Some(id) => self.scenario.payload.replace(&self.scenario.payload_marker, id),
            None => self.scenario.payload.clone(),
        }
    }

    pub fn has_payload_id(&self, payload_id: &str) -> bool {
        self.output.payload_ids.iter().any(|id| id == payload_id)
    }
}
