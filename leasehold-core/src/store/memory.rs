use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::trace;

use crate::record::{LeaseId, LeaseRecord};
use crate::Result;

use super::{LockStore, WriteOutcome};

/// In-process store. Clones share the same records, so every task in a
/// process holding a clone coordinates through it.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, LeaseRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl LockStore for MemoryStore {
    async fn read(&self, lock_id: &str) -> Result<Option<LeaseRecord>> {
        Ok(self.records.lock().await.get(lock_id).cloned())
    }

    async fn create_if_absent(&self, record: &LeaseRecord) -> Result<WriteOutcome> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.lock_id) {
            trace!(lock_id = %record.lock_id, "create: record exists");
            return Ok(WriteOutcome::PreconditionFailed);
        }
        records.insert(record.lock_id.clone(), record.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn update_if_matches(
        &self,
        expected: &LeaseId,
        record: &LeaseRecord,
    ) -> Result<WriteOutcome> {
        let mut records = self.records.lock().await;
        match records.get_mut(&record.lock_id) {
            Some(current) if &current.lease_id == expected => {
                *current = record.clone();
                Ok(WriteOutcome::Applied)
            }
            _ => {
                trace!(lock_id = %record.lock_id, %expected, "update: lease id mismatch");
                Ok(WriteOutcome::PreconditionFailed)
            }
        }
    }

    async fn delete_if_matches(&self, lock_id: &str, expected: &LeaseId) -> Result<WriteOutcome> {
        let mut records = self.records.lock().await;
        if records
            .get(lock_id)
            .is_some_and(|current| &current.lease_id == expected)
        {
            records.remove(lock_id);
            Ok(WriteOutcome::Applied)
        } else {
            trace!(lock_id, %expected, "delete: lease id mismatch");
            Ok(WriteOutcome::PreconditionFailed)
        }
    }
}
