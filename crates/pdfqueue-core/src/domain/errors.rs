//! Errors - エラー型と分類
//!
//! - `StorageError`: backing store の障害（処理中の操作は中断）
//! - `TaskExecutionError`: handler の失敗（retry policy が吸収する）
//! - `QueueError`: control API / processor が呼び出し元に返すエラー

use thiserror::Error;

use super::ids::{BatchKey, GroupId, TaskId};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store backend failure: {0}")]
    Backend(#[from] sled::Error),

    #[error("corrupt record under key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Failure reported by the operation a task invokes.
#[derive(Debug, Error)]
pub enum TaskExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl TaskExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("the queue is already being processed")]
    Conflict,

    #[error("there are no queued tasks")]
    EmptyQueue,

    #[error("task {task_id} not found in {batch}/{group}")]
    NotFound {
        batch: BatchKey,
        group: GroupId,
        task_id: TaskId,
    },

    #[error("task {task_id} is waiting on earlier tasks in its group")]
    TaskBlocked { task_id: TaskId },
}

impl QueueError {
    /// Machine readable code the UI can switch on.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Storage(_) => "storage_error",
            QueueError::Conflict => "conflict",
            QueueError::EmptyQueue => "empty_queue",
            QueueError::NotFound { .. } => "not_found",
            QueueError::TaskBlocked { .. } => "task_blocked",
        }
    }
}
