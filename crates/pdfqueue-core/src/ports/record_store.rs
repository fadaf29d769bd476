//! RecordStore port - 永続 key/value store
//!
//! batch と process lock はすべてこの trait 越しに保存されます。
//! business logic は持たず、値は不透明な bytes です。
//!
//! # 実装
//! - `InMemoryStore`: テスト・開発用
//! - `SledStore`: 組み込み DB（sled）による永続化

use async_trait::async_trait;

use crate::domain::StorageError;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Full replacement of the value under `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// All entries whose key starts with `prefix`, newest first
    /// (descending key order).
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

    /// Atomically replace the value under `key` with `new` if the current
    /// value equals `expected` (`None` = absent / delete).
    ///
    /// Returns `false` when the current value did not match.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> Result<bool, StorageError>;
}
