//! QueueClient - producer 側の窓口
//!
//! group ごとの task 列を受け取り、id を振って 1 batch として保存し、
//! dispatcher を起こします。

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::dispatcher::Dispatcher;
use crate::domain::{BatchKey, FunctionRef, PendingBatch, StorageError, Task, TaskGroup};
use crate::ports::IdGenerator;
use crate::queue::BatchRepository;
use crate::typed::Function;

/// A task before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub function: FunctionRef,
    pub args: Vec<Value>,
}

impl NewTask {
    pub fn call<F: Function>(call: &F) -> Self {
        Self {
            function: FunctionRef::new(F::NAME),
            args: call.to_args(),
        }
    }

    pub fn raw(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: FunctionRef::new(function),
            args,
        }
    }
}

pub struct QueueClient {
    repo: Arc<BatchRepository>,
    ids: Arc<dyn IdGenerator>,
    dispatcher: Arc<Dispatcher>,
}

impl QueueClient {
    pub fn new(repo: Arc<BatchRepository>, ids: Arc<dyn IdGenerator>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { repo, ids, dispatcher }
    }

    /// Save `groups` as one batch and wake the dispatcher.
    ///
    /// Empty groups are skipped; `None` means nothing was queued.
    pub async fn enqueue(&self, groups: Vec<Vec<NewTask>>) -> Result<Option<BatchKey>, StorageError> {
        let key = self.save(groups).await?;
        if key.is_some() {
            self.dispatcher.dispatch();
        }
        Ok(key)
    }

    /// Save without dispatching; the next chain or healthcheck picks it up.
    pub async fn save(&self, groups: Vec<Vec<NewTask>>) -> Result<Option<BatchKey>, StorageError> {
        let mut pending = PendingBatch::new();
        for tasks in groups {
            let group: TaskGroup = tasks
                .into_iter()
                .map(|t| Task::new(self.ids.generate_task_id(), t.function, t.args))
                .collect();
            pending.push(self.ids.generate_group_id(), group);
        }

        let key = self.repo.save(pending).await?;
        if let Some(key) = &key {
            info!(batch = %key, "queued batch");
        }
        Ok(key)
    }
}
