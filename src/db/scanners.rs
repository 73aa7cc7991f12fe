use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};
use crate::errors::FuzzError;
use crate::models::ContentId;
use crate::queue::ScannerLookup;
use crate::scanners::{Monitors, Scanner};
use super::schema::CREATE_SCANNERS;
use super::Database;

/// Registered scanners, persisted so monitors can be rebuilt by any process.
///
/// The scanner list and the grouped monitors are cached after the first
/// non-empty load. Registering through this instance invalidates both.
pub struct ScannerStore {
    db: Database,
    list_cache: Mutex<Option<Arc<Vec<Scanner>>>>,
    monitors_cache: Mutex<Option<Arc<Monitors>>>,
}

impl ScannerStore {
    pub fn new(db: Database) -> Result<Self, FuzzError> {
        db.execute_batch(CREATE_SCANNERS)?;
        Ok(Self {
            db,
            list_cache: Mutex::new(None),
            monitors_cache: Mutex::new(None),
        })
    }

    fn invalidate(&self) -> Result<(), FuzzError> {
        *self.list_cache.lock().map_err(|_| poisoned())? = None;
        *self.monitors_cache.lock().map_err(|_| poisoned())? = None;
        Ok(())
    }

    pub fn register(&self, scanners: &[Scanner]) -> Result<usize, FuzzError> {
        let mut rows = Vec::with_capacity(scanners.len());
        for scanner in scanners {
            let (kind, obj) = scanner.to_stored()?;
            rows.push((scanner.scanner_id()?, kind, obj));
        }

        let mut inserted = 0;
        {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR IGNORE INTO scanners (uid, kind, obj) VALUES (?1, ?2, ?3)",
                )?;
                for (uid, kind, obj) in &rows {
                    inserted += stmt
                        .execute(params![uid.as_i64(), kind, obj])
                        .map_err(|e| FuzzError::Database(format!("Failed to register scanner: {}", e)))?;
                }
            }
            tx.commit()?;
        }
        self.invalidate()?;
        info!(submitted = rows.len(), inserted, "Registered scanners");
        Ok(inserted)
    }

    fn load_all(&self) -> Result<Vec<Scanner>, FuzzError> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare("SELECT uid, kind, obj FROM scanners ORDER BY rowid")
            .map_err(|e| FuzzError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(|e| FuzzError::Database(format!("Query error: {}", e)))?;

        let mut scanners = Vec::new();
        for row in rows {
            let (uid, kind, obj) = row.map_err(|e| FuzzError::Database(format!("Row error: {}", e)))?;
            match Scanner::from_stored(&kind, &obj) {
                Ok(scanner) => scanners.push(scanner),
                Err(e) => warn!(uid, kind = %kind, error = %e, "Skipping unreadable scanner"),
            }
        }
        Ok(scanners)
    }

    pub fn list_all(&self) -> Result<Arc<Vec<Scanner>>, FuzzError> {
        let mut cache = self.list_cache.lock().map_err(|_| poisoned())?;
        if let Some(list) = cache.as_ref() {
            return Ok(list.clone());
        }
        let list = Arc::new(self.load_all()?);
        if !list.is_empty() {
            *cache = Some(list.clone());
        }
        Ok(list)
    }

    pub fn monitors(&self) -> Result<Arc<Monitors>, FuzzError> {
        if let Some(monitors) = self.monitors_cache.lock().map_err(|_| poisoned())?.as_ref() {
            return Ok(monitors.clone());
        }
        let scanners = self.list_all()?;
        let monitors = Arc::new(Monitors::from_scanners(scanners.iter().cloned()));
        if !scanners.is_empty() {
            *self.monitors_cache.lock().map_err(|_| poisoned())? = Some(monitors.clone());
        }
        Ok(monitors)
    }
}

fn poisoned() -> FuzzError {
    FuzzError::Internal("Scanner cache lock poisoned".into())
}

#[async_trait]
impl ScannerLookup for ScannerStore {
    async fn get(&self, id: ContentId) -> Result<Option<Scanner>, FuzzError> {
        let row: Option<(String, String)> = {
            let conn = self.db.lock()?;
            conn.query_row(
                "SELECT kind, obj FROM scanners WHERE uid = ?1",
                params![id.as_i64()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| FuzzError::Database(format!("Failed to load scanner: {}", e)))?
        };
        match row {
            Some((kind, obj)) => Ok(Some(Scanner::from_stored(&kind, &obj)?)),
            None => Ok(None),
        }
    }
}
