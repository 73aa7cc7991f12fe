use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;
use std::sync::Mutex;
use async_trait::async_trait;
use rusqlite::params;
use tracing::{debug, error, warn};
use crate::db::schema::{queue_table, validate_table_name};
use crate::db::Database;
use crate::errors::FuzzError;
use crate::models::{canonical_json, ContentId};
use crate::utils::truncate_dump;
use super::contracts::{DurableQueue, QueueItem, QueueSink};

pub const DEFAULT_BATCH_SIZE: usize = 512;
pub const DEFAULT_RECENT_CACHE_SIZE: usize = 512;

/// Durable work queue over one SQLite table.
///
/// Delivery is at-least-once with no acknowledgment: `get` marks a whole batch
/// delivered before handing items out, so items still in the in-memory batch
/// (or in a consumer's hands) when the process dies are not served again.
///
/// Refills are serialized by `refill`; a read that finds prefetched items only
/// touches the batch itself.
pub struct PersistentQueue<T> {
    db: Database,
    table: String,
    batch_size: usize,
    recent_cache_size: usize,
    recent_puts: Mutex<HashSet<ContentId>>,
    batch: Mutex<VecDeque<T>>,
    refill: Mutex<()>,
    _item: PhantomData<fn() -> T>,
}

impl<T: QueueItem> PersistentQueue<T> {
    pub fn new(db: Database, table: &str) -> Result<Self, FuzzError> {
        Self::with_sizes(db, table, DEFAULT_BATCH_SIZE, DEFAULT_RECENT_CACHE_SIZE)
    }

    pub fn with_sizes(
        db: Database,
        table: &str,
        batch_size: usize,
        recent_cache_size: usize,
    ) -> Result<Self, FuzzError> {
        validate_table_name(table)?;
        db.execute_batch(&queue_table(table))?;
        Ok(Self {
            db,
            table: table.to_string(),
            batch_size: batch_size.max(1),
            recent_cache_size,
            recent_puts: Mutex::new(HashSet::new()),
            batch: Mutex::new(VecDeque::new()),
            refill: Mutex::new(()),
            _item: PhantomData,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Serialized rows for the items not seen in the recent-puts cache.
    fn fresh_rows(&self, items: &[T]) -> Result<Vec<(ContentId, String)>, FuzzError> {
        let mut recent = self
            .recent_puts
            .lock()
            .map_err(|_| FuzzError::Internal("Recent-puts cache lock poisoned".into()))?;

        let mut rows = Vec::new();
        for item in items {
            let obj = match canonical_json(item) {
                Ok(obj) => obj,
                Err(e) => {
                    warn!(table = %self.table, error = %e, "Skipping unserializable queue item");
                    continue;
                }
            };
            let uid = ContentId::of_bytes(obj.as_bytes());
            if recent.contains(&uid) {
                continue;
            }
            if self.recent_cache_size > 0 {
                while recent.len() >= self.recent_cache_size {
                    let Some(evicted) = recent.iter().next().copied() else { break };
                    recent.remove(&evicted);
                }
                recent.insert(uid);
            }
            rows.push((uid, obj));
        }
        Ok(rows)
    }

    fn insert_rows(&self, rows: &[(ContentId, String)]) -> Result<(), FuzzError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR IGNORE INTO {} (uid, delivered, obj) VALUES (?1, 0, ?2)",
                self.table
            ))?;
            for (uid, obj) in rows {
                stmt.execute(params![uid.as_i64(), obj])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetches the next batch and marks it delivered in one transaction.
    fn fetch_batch(&self) -> Result<Vec<T>, FuzzError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        let rows: Vec<(i64, String)> = {
            let mut stmt = tx.prepare_cached(&format!(
                "SELECT uid, obj FROM {} WHERE delivered = 0 LIMIT ?1",
                self.table
            ))?;
            let mapped = stmt.query_map(params![self.batch_size as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            mapped.collect::<Result<Vec<_>, _>>()?
        };

        {
            let mut mark = tx.prepare_cached(&format!(
                "UPDATE {} SET delivered = 1 WHERE uid = ?1",
                self.table
            ))?;
            for (uid, _) in &rows {
                mark.execute(params![uid])?;
            }
        }
        tx.commit()?;

        let mut items = Vec::with_capacity(rows.len());
        for (uid, obj) in rows {
            match serde_json::from_str::<T>(&obj) {
                Ok(item) => items.push(item),
                Err(e) => error!(
                    table = %self.table,
                    uid,
                    error = %e,
                    obj = %truncate_dump(&obj),
                    "Dropping undecodable queue row"
                ),
            }
        }
        Ok(items)
    }

    fn pop_prefetched(&self) -> Result<Option<T>, FuzzError> {
        Ok(self
            .batch
            .lock()
            .map_err(|_| FuzzError::Internal("Queue batch lock poisoned".into()))?
            .pop_front())
    }

    fn undelivered_count(&self) -> Result<usize, FuzzError> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(uid) FROM {} WHERE delivered = 0", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl<T: QueueItem> QueueSink<T> for PersistentQueue<T> {
    async fn put(&self, items: Vec<T>) -> Result<(), FuzzError> {
        let rows = self.fresh_rows(&items)?;
        if rows.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.insert_rows(&rows) {
            let dump: Vec<String> = rows.iter().map(|(uid, obj)| format!("({}, {})", uid, obj)).collect();
            error!(
                table = %self.table,
                error = %e,
                rows = %truncate_dump(&dump.join("\n")),
                "Failed to insert queue rows"
            );
            return Ok(());
        }
        debug!(table = %self.table, inserted = rows.len(), "Queued items");
        Ok(())
    }
}

#[async_trait]
impl<T: QueueItem> DurableQueue<T> for PersistentQueue<T> {
    async fn get(&self) -> Result<Option<T>, FuzzError> {
        if let Some(item) = self.pop_prefetched()? {
            return Ok(Some(item));
        }

        let _refill = self
            .refill
            .lock()
            .map_err(|_| FuzzError::Internal("Queue refill lock poisoned".into()))?;
        // another reader may have refilled while we waited
        if let Some(item) = self.pop_prefetched()? {
            return Ok(Some(item));
        }

        let mut fetched: VecDeque<T> = self.fetch_batch()?.into();
        let first = fetched.pop_front();
        self.batch
            .lock()
            .map_err(|_| FuzzError::Internal("Queue batch lock poisoned".into()))?
            .extend(fetched);
        Ok(first)
    }

    async fn size(&self) -> Result<usize, FuzzError> {
        let prefetched = self
            .batch
            .lock()
            .map_err(|_| FuzzError::Internal("Queue batch lock poisoned".into()))?
            .len();
        Ok(self.undelivered_count()? + prefetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeSet;

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    struct Job {
        name: String,
    }

    fn job(i: usize) -> Job {
        Job { name: format!("job-{}", i) }
    }

    fn queue(batch: usize, cache: usize) -> PersistentQueue<Job> {
        PersistentQueue::with_sizes(Database::in_memory().unwrap(), "jobs", batch, cache).unwrap()
    }

    #[tokio::test]
    async fn test_every_item_returned_once() {
        let q = queue(3, 4);
        q.put((0..10).map(job).collect()).await.unwrap();
        assert_eq!(q.size().await.unwrap(), 10);

        let mut seen = BTreeSet::new();
        while let Some(item) = q.get().await.unwrap() {
            assert!(seen.insert(item));
        }
        assert_eq!(seen.len(), 10);
        assert_eq!(q.size().await.unwrap(), 0);
        assert!(q.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prefetched_items_served_while_refill_is_held() {
        let q = queue(3, 0);
        q.put((0..3).map(job).collect()).await.unwrap();
        assert!(q.get().await.unwrap().is_some());

        let _refill = q.refill.lock().unwrap();
        assert!(q.get().await.unwrap().is_some());
        assert!(q.get().await.unwrap().is_some());
        assert_eq!(q.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reput_is_noop() {
        let q = queue(512, 0);
        q.put(vec![job(1), job(2)]).await.unwrap();
        q.put(vec![job(1)]).await.unwrap();
        assert_eq!(q.size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reput_after_delivery_not_served_again() {
        let q = queue(512, 0);
        q.put(vec![job(1)]).await.unwrap();
        assert_eq!(q.get().await.unwrap(), Some(job(1)));
        q.put(vec![job(1)]).await.unwrap();
        assert!(q.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_size_counts_prefetched_batch() {
        let q = queue(4, 16);
        q.put((0..6).map(job).collect()).await.unwrap();
        q.get().await.unwrap();
        // three still in memory, two undelivered in the table
        assert_eq!(q.size().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_recent_cache_stays_bounded() {
        let q = queue(512, 2);
        q.put((0..5).map(job).collect()).await.unwrap();
        assert!(q.recent_puts.lock().unwrap().len() <= 2);
        assert_eq!(q.size().await.unwrap(), 5);
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let result = PersistentQueue::<Job>::new(Database::in_memory().unwrap(), "bad name");
        assert!(result.is_err());
    }
}
