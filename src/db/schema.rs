//! DDL for the stores. Queue tables are created per item type, so their
//! statements take the table name.

use crate::errors::FuzzError;

/// Table names are interpolated into SQL and must be plain identifiers.
pub fn validate_table_name(table: &str) -> Result<(), FuzzError> {
    let valid = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(FuzzError::Database(format!("Invalid table name: {}", table)))
    }
}

pub fn queue_table(table: &str) -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS {table} (
    uid INTEGER PRIMARY KEY,
    delivered INTEGER NOT NULL DEFAULT 0,
    obj TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_delivered ON {table}(delivered);
"
    )
}

pub const CREATE_PAYLOAD_IDS: &str = "
CREATE TABLE IF NOT EXISTS payload_ids (
    payload_id TEXT PRIMARY KEY,
    iteration_id INTEGER NOT NULL
);
";

pub const CREATE_VULNERABILITIES: &str = "
CREATE TABLE IF NOT EXISTS vulnerabilities (
    vulnerability_id INTEGER PRIMARY KEY,
    obj TEXT NOT NULL
);
";

pub const CREATE_SCANNERS: &str = "
CREATE TABLE IF NOT EXISTS scanners (
    uid INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,
    obj TEXT NOT NULL
);
";
