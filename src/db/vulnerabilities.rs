use async_trait::async_trait;
use rusqlite::params;
use crate::errors::FuzzError;
use crate::models::Vulnerability;
use crate::queue::{VulnerabilitySink, VulnerabilitySource};
use super::schema::CREATE_VULNERABILITIES;
use super::Database;

pub struct VulnerabilityStore {
    db: Database,
}

impl VulnerabilityStore {
    pub fn new(db: Database) -> Result<Self, FuzzError> {
        db.execute_batch(CREATE_VULNERABILITIES)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl VulnerabilitySink for VulnerabilityStore {
    async fn add(&self, vulnerabilities: Vec<Vulnerability>) -> Result<(), FuzzError> {
        let mut rows = Vec::with_capacity(vulnerabilities.len());
        for vulnerability in &vulnerabilities {
            rows.push((vulnerability.vulnerability_id()?, serde_json::to_string(vulnerability)?));
        }

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO vulnerabilities (vulnerability_id, obj) VALUES (?1, ?2)",
            )?;
            for (id, obj) in &rows {
                stmt.execute(params![id.as_i64(), obj])
                    .map_err(|e| FuzzError::Database(format!("Failed to insert vulnerability: {}", e)))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl VulnerabilitySource for VulnerabilityStore {
    async fn list_all(&self) -> Result<Vec<Vulnerability>, FuzzError> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare("SELECT obj FROM vulnerabilities ORDER BY rowid")
            .map_err(|e| FuzzError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| FuzzError::Database(format!("Query error: {}", e)))?;

        let mut vulnerabilities = Vec::new();
        for row in rows {
            let obj = row.map_err(|e| FuzzError::Database(format!("Row error: {}", e)))?;
            vulnerabilities.push(serde_json::from_str(&obj)?);
        }
        Ok(vulnerabilities)
    }
}
