//! SledStore - sled（組み込み DB）による永続 RecordStore
//!
//! sled はネイティブに compare-and-swap を持つので、process lock の取得を
//! アトミックに行えます。書き込みのたびに flush して、プロセスが落ちても
//! 進捗が残るようにしています。

use std::path::Path;

use async_trait::async_trait;

use crate::domain::StorageError;
use crate::ports::RecordStore;

#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// Store backed by a temporary directory removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.db.insert(key, value)?;
        self.flush().await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.db.remove(key)?;
        self.flush().await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let mut entries = Vec::new();
        for entry in self.db.scan_prefix(prefix) {
            let (k, v) = entry?;
            entries.push((String::from_utf8_lossy(&k).into_owned(), v.to_vec()));
        }
        entries.reverse();
        Ok(entries)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> Result<bool, StorageError> {
        let swapped = self.db.compare_and_swap(key, expected, new)?.is_ok();
        if swapped {
            self.flush().await?;
        }
        Ok(swapped)
    }
}
