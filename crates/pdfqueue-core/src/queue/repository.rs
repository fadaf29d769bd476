//! Batch repository: the only component that reads or writes batch records.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{Batch, BatchKey, BatchRecord, Groups, PendingBatch, StorageError};
use crate::ports::{Clock, RecordStore};

pub struct BatchRepository {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    identifier: String,
}

impl BatchRepository {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, identifier: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    fn sequence_key(&self) -> String {
        format!("{}_sequence", self.identifier)
    }

    /// All batches, newest first.
    ///
    /// Records that cannot be decoded are skipped (and logged) so that one
    /// bad record does not hide the rest of the queue.
    pub async fn list_batches(&self) -> Result<Vec<Batch>, StorageError> {
        let prefix = BatchKey::prefix(&self.identifier);
        let entries = self.store.scan_prefix(&prefix).await?;

        let mut batches = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            match serde_json::from_slice::<BatchRecord>(&raw) {
                Ok(record) => batches.push(Batch::from_record(BatchKey::new(key), record)),
                Err(e) => warn!(batch = %key, error = %e, "skipping undecodable batch record"),
            }
        }
        Ok(batches)
    }

    /// The batch the processor should work on next.
    pub async fn oldest(&self) -> Result<Option<Batch>, StorageError> {
        Ok(self.list_batches().await?.pop())
    }

    pub async fn get(&self, key: &BatchKey) -> Result<Option<Batch>, StorageError> {
        self.load_record(key)
            .await
            .map(|record| record.map(|r| Batch::from_record(key.clone(), r)))
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.list_batches().await?.is_empty())
    }

    /// Persist a new batch. Returns `None` (and writes nothing) when the
    /// pending batch has no groups.
    pub async fn save(&self, pending: PendingBatch) -> Result<Option<BatchKey>, StorageError> {
        if pending.is_empty() {
            return Ok(None);
        }

        let key = BatchKey::from_sequence(&self.identifier, self.next_sequence().await?);
        let record = BatchRecord {
            timestamp: self.clock.now(),
            data: pending.into_groups(),
        };
        self.store.put(key.as_str(), encode(&record)?).await?;
        debug!(batch = %key, groups = record.data.len(), "saved batch");
        Ok(Some(key))
    }

    /// Replace the groups of an existing batch, keeping its timestamp.
    ///
    /// Empty `groups` deletes the batch. A batch that no longer exists is left
    /// deleted.
    pub async fn update(&self, key: &BatchKey, groups: &Groups) -> Result<(), StorageError> {
        if groups.values().all(|g| g.is_empty()) {
            return self.delete(key).await;
        }

        let Some(existing) = self.load_record(key).await? else {
            debug!(batch = %key, "batch vanished before update; not recreating it");
            return Ok(());
        };

        let record = BatchRecord {
            timestamp: existing.timestamp,
            data: groups
                .iter()
                .filter(|(_, g)| !g.is_empty())
                .map(|(id, g)| (id.clone(), g.clone()))
                .collect(),
        };
        self.store.put(key.as_str(), encode(&record)?).await
    }

    pub async fn delete(&self, key: &BatchKey) -> Result<(), StorageError> {
        self.store.delete(key.as_str()).await?;
        debug!(batch = %key, "deleted batch");
        Ok(())
    }

    /// Delete every batch; returns how many were removed.
    pub async fn delete_all(&self) -> Result<usize, StorageError> {
        let prefix = BatchKey::prefix(&self.identifier);
        let entries = self.store.scan_prefix(&prefix).await?;
        for (key, _) in &entries {
            self.store.delete(key).await?;
        }
        Ok(entries.len())
    }

    async fn load_record(&self, key: &BatchKey) -> Result<Option<BatchRecord>, StorageError> {
        let Some(raw) = self.store.get(key.as_str()).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    /// Allocate the next batch sequence number with a CAS loop.
    async fn next_sequence(&self) -> Result<u64, StorageError> {
        let key = self.sequence_key();
        loop {
            let current = self.store.get(&key).await?;
            let last = match &current {
                Some(raw) => serde_json::from_slice::<u64>(raw).map_err(|source| StorageError::Corrupt {
                    key: key.clone(),
                    source,
                })?,
                None => 0,
            };
            let next = last + 1;
            if self
                .store
                .compare_and_swap(&key, current.as_deref(), Some(encode(&next)?))
                .await?
            {
                return Ok(next);
            }
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(StorageError::Encode)
}
