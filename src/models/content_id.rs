use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::errors::FuzzError;

/// Content-addressed identity of a persisted entity.
///
/// SHA-256 over the canonical JSON serialization, reduced modulo 2^63 so it
/// fits a signed SQLite INTEGER primary key. Two distinct entities sharing an
/// id is possible after the truncation but astronomically unlikely; stores
/// treat an id collision as "already present".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub i64);

impl ContentId {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&digest[24..32]);
        let value = u64::from_be_bytes(tail) & (i64::MAX as u64);
        ContentId(value as i64)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical serialization used both for storage and for identity.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, FuzzError> {
    Ok(serde_json::to_string(value)?)
}

pub fn content_id<T: Serialize>(value: &T) -> Result<ContentId, FuzzError> {
    Ok(ContentId::of_bytes(canonical_json(value)?.as_bytes()))
}
