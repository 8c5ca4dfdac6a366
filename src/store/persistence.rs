//! Persistence layer for the Job Store

use crate::error::StorageError;
use crate::jobs::{JobId, JobRecord};
use crate::store::JobStore;
use std::path::Path;

fn sled_error(action: &str, e: sled::Error) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Failed to {}: {}", action, e),
    ))
}

/// Sled-based implementation of JobStore
pub struct SledJobStore {
    db: sled::Db,
}

impl SledJobStore {
    /// Open (or create) the job database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| sled_error("open sled database", e))?;
        Ok(Self { db })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| sled_error("flush job store", e))?;
        Ok(())
    }

    fn decode(value: &[u8]) -> Result<JobRecord, StorageError> {
        bincode::deserialize(value)
            .map_err(|e| StorageError::Serialization(format!("Failed to deserialize job record: {}", e)))
    }
}

impl JobStore for SledJobStore {
    fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StorageError> {
        match self
            .db
            .get(id.as_bytes())
            .map_err(|e| sled_error("get job record", e))?
        {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: &JobRecord) -> Result<(), StorageError> {
        let value = bincode::serialize(record)
            .map_err(|e| StorageError::Serialization(format!("Failed to serialize job record: {}", e)))?;
        self.db
            .insert(record.id.as_bytes(), value)
            .map_err(|e| sled_error("put job record", e))?;
        Ok(())
    }

    fn delete(&self, id: &JobId) -> Result<bool, StorageError> {
        let removed = self
            .db
            .remove(id.as_bytes())
            .map_err(|e| sled_error("delete job record", e))?;
        Ok(removed.is_some())
    }

    fn list_all(&self) -> Result<Vec<JobRecord>, StorageError> {
        let mut records = Vec::new();
        for item in self.db.iter() {
            let (_, value) = item.map_err(|e| sled_error("iterate job store", e))?;
            records.push(Self::decode(&value)?);
        }
        Ok(records)
    }
}
