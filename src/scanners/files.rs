use std::collections::{HashMap, HashSet};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use crate::errors::FuzzError;

/// Remembers how far each watched file has been read so only appended bytes
/// are handed to scanners.
#[derive(Default)]
pub struct FileDeltaReader {
    offsets: Mutex<HashMap<PathBuf, u64>>,
    missing: Mutex<HashSet<PathBuf>>,
}

impl FileDeltaReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn offset(&self, path: &Path) -> Result<Option<u64>, FuzzError> {
        Ok(self
            .offsets
            .lock()
            .map_err(|_| FuzzError::Internal("File offset cache lock poisoned".into()))?
            .get(path)
            .copied())
    }

    fn remember(&self, path: &Path, len: u64) -> Result<(), FuzzError> {
        self.offsets
            .lock()
            .map_err(|_| FuzzError::Internal("File offset cache lock poisoned".into()))?
            .insert(path.to_path_buf(), len);
        Ok(())
    }

    /// Records that `path` was absent. True only the first time in a row,
    /// so callers can report a missing file once.
    pub fn mark_missing(&self, path: &Path) -> bool {
        match self.missing.lock() {
            Ok(mut missing) => missing.insert(path.to_path_buf()),
            Err(_) => false,
        }
    }

    fn mark_present(&self, path: &Path) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.remove(path);
        }
    }

    /// New contents of `path` since the previous read.
    ///
    /// `None` when the file does not exist. The first read only records a
    /// baseline and yields an empty string. A file that shrank is returned in
    /// full.
    pub async fn read_delta(&self, path: &Path) -> Result<Option<String>, FuzzError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let len = metadata.len();
        self.mark_present(path);

        let Some(previous) = self.offset(path)? else {
            self.remember(path, len)?;
            return Ok(Some(String::new()));
        };
        if previous == len {
            return Ok(Some(String::new()));
        }

        let start = if len < previous { 0 } else { previous };
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(start)).await?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;

        self.remember(path, start + bytes.len() as u64)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
