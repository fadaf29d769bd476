//! Domain identifiers (strongly-typed IDs).
//!
//! Task / group の ID は producer から渡される不透明な文字列です。
//! `Id<T>` に Phantom type のマーカーを付けることで、`TaskId` と `GroupId`
//! を取り違えるとコンパイルエラーになります。
//!
//! `BatchKey` だけは store のキーそのものなので、別の型として扱います。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// 生成時に使うプレフィックス（"task-", "group-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic opaque identifier.
///
/// Serialized as a bare string, so the persisted record stays
/// `{"id": "create-pdf-12", ...}` regardless of the marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskTag {}

impl IdMarker for TaskTag {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Task group のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupTag {}

impl IdMarker for GroupTag {
    fn prefix() -> &'static str {
        "group-"
    }
}

/// Identifier of a Task (unique within its group, stable across retries).
pub type TaskId = Id<TaskTag>;

/// Identifier of a Task Group inside a batch.
pub type GroupId = Id<GroupTag>;

/// Store key of a batch: `<identifier>_batch_<sequence>`.
///
/// The sequence is zero padded so that lexicographic key order is creation
/// order, which is what the store's prefix scan sorts by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchKey(String);

impl BatchKey {
    const SEQUENCE_WIDTH: usize = 20;

    pub fn prefix(identifier: &str) -> String {
        format!("{identifier}_batch_")
    }

    pub fn from_sequence(identifier: &str, sequence: u64) -> Self {
        Self(format!(
            "{}{:0width$}",
            Self::prefix(identifier),
            sequence,
            width = Self::SEQUENCE_WIDTH
        ))
    }

    /// Wrap a raw store key (e.g. one received from the control API).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sequence number encoded in the key, if it has the expected shape.
    pub fn sequence(&self) -> Option<u64> {
        let (_, seq) = self.0.rsplit_once("_batch_")?;
        seq.parse().ok()
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
