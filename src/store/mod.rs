//! Job Store
//!
//! Durable home of job records. The queue is the only writer; status queries
//! read snapshots from here.

use crate::error::StorageError;
use crate::jobs::{JobId, JobRecord};
use parking_lot::RwLock;
use std::collections::HashMap;

pub mod persistence;

pub use persistence::SledJobStore;

pub trait JobStore: Send + Sync {
    fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StorageError>;
    fn put(&self, record: &JobRecord) -> Result<(), StorageError>;
    /// Returns whether a record was removed.
    fn delete(&self, id: &JobId) -> Result<bool, StorageError>;
    fn list_all(&self) -> Result<Vec<JobRecord>, StorageError>;
}

/// Process-local store; jobs do not survive a restart.
#[derive(Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StorageError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn put(&self, record: &JobRecord) -> Result<(), StorageError> {
        self.records.write().insert(record.id, record.clone());
        Ok(())
    }

    fn delete(&self, id: &JobId) -> Result<bool, StorageError> {
        Ok(self.records.write().remove(id).is_some())
    }

    fn list_all(&self) -> Result<Vec<JobRecord>, StorageError> {
        Ok(self.records.read().values().cloned().collect())
    }
}
