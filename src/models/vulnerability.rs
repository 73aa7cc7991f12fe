use serde::{Deserialize, Serialize};
use crate::errors::FuzzError;
use super::content_id::{content_id, ContentId};

/// A finding reported by a scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub detection_result: String,
    /// Payload identity extracted from the match, when the phrase carried the marker.
    pub payload_id: Option<String>,
    pub context_location: Option<String>,
    pub scanner_id: ContentId,
    pub iteration_result_id: Option<ContentId>,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Vulnerability {
    pub fn new(
        detection_result: String,
        payload_id: Option<String>,
        context_location: Option<String>,
        scanner_id: ContentId,
        iteration_result_id: Option<ContentId>,
    ) -> Self {
        Self {
            detection_result,
            payload_id,
            context_location,
            scanner_id,
            iteration_result_id,
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }

    pub fn vulnerability_id(&self) -> Result<ContentId, FuzzError> {
        content_id(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_recent() {
        let v = Vulnerability::new("x".into(), None, None, ContentId(1), None);
        let now = chrono::Utc::now().timestamp() as f64;
        assert!((now - v.timestamp).abs() < 5.0);
    }

    #[test]
    fn test_vulnerability_id_covers_payload_id() {
        let mut a = Vulnerability::new("x".into(), Some("1".into()), None, ContentId(1), None);
        a.timestamp = 0.0;
        let mut b = a.clone();
        b.payload_id = Some("2".into());
        assert_ne!(a.vulnerability_id().unwrap(), b.vulnerability_id().unwrap());
    }
}
