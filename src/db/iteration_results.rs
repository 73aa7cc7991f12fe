use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tracing::error;
use crate::errors::FuzzError;
use crate::models::{ContentId, IterationResult};
use crate::queue::{IterationResultLookup, PersistentQueue, QueueSink};
use super::schema::CREATE_PAYLOAD_IDS;
use super::Database;

const TABLE: &str = "iteration_results";

/// Durable record of every iteration result, indexed by content id and by the
/// payload ids observed in its output.
pub struct IterationResultStore {
    db: Database,
    rows: PersistentQueue<IterationResult>,
}

impl IterationResultStore {
    pub fn new(db: Database) -> Result<Self, FuzzError> {
        let rows = PersistentQueue::new(db.clone(), TABLE)?;
        db.execute_batch(CREATE_PAYLOAD_IDS)?;
        Ok(Self { db, rows })
    }

    fn index_payload_ids(&self, results: &[IterationResult]) -> Result<(), FuzzError> {
        let mut entries = Vec::new();
        for result in results {
            let id = result.iteration_id()?;
            for payload_id in &result.output.payload_ids {
                entries.push((payload_id.clone(), id));
            }
        }
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO payload_ids (payload_id, iteration_id) VALUES (?1, ?2)",
            )?;
            for (payload_id, id) in &entries {
                stmt.execute(params![payload_id, id.as_i64()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load<P: rusqlite::Params>(&self, sql: &str, key: P) -> Result<Option<IterationResult>, FuzzError> {
        let conn = self.db.lock()?;
        let obj: Option<String> = conn
            .query_row(sql, key, |row| row.get(0))
            .optional()
            .map_err(|e| FuzzError::Database(format!("Failed to load iteration result: {}", e)))?;
        match obj {
            Some(obj) => Ok(Some(serde_json::from_str(&obj)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QueueSink<IterationResult> for IterationResultStore {
    async fn put(&self, items: Vec<IterationResult>) -> Result<(), FuzzError> {
        if let Err(e) = self.index_payload_ids(&items) {
            error!(error = %e, results = items.len(), "Failed to index payload ids");
        }
        self.rows.put(items).await
    }
}

#[async_trait]
impl IterationResultLookup for IterationResultStore {
    async fn get(&self, id: ContentId) -> Result<Option<IterationResult>, FuzzError> {
        self.load(
            &format!("SELECT obj FROM {} WHERE uid = ?1", TABLE),
            params![id.as_i64()],
        )
    }

    async fn get_by_payload_id(&self, payload_id: &str) -> Result<Option<IterationResult>, FuzzError> {
        self.load(
            &format!(
                "SELECT r.obj FROM {} r INNER JOIN payload_ids p ON r.uid = p.iteration_id WHERE p.payload_id = ?1",
                TABLE
            ),
            params![payload_id],
        )
    }
}
