//! Control API - UI からの list / run / delete 操作
//!
//! 変更系の操作はすべて process lock を取ってから書き込むので、
//! 同時に始まった pass と競合しません。

use std::sync::Arc;

use tracing::info;

use super::dispatcher::Dispatcher;
use super::status::{QueueStatus, StatusProjector};
use crate::domain::{BatchKey, GroupId, QueueError, TaskId};
use crate::queue::{BatchRepository, ProcessLock, QueueProcessor};

pub struct ControlApi {
    repo: Arc<BatchRepository>,
    lock: Arc<ProcessLock>,
    processor: Arc<QueueProcessor>,
    dispatcher: Arc<Dispatcher>,
    projector: Arc<StatusProjector>,
}

impl ControlApi {
    pub fn new(
        repo: Arc<BatchRepository>,
        lock: Arc<ProcessLock>,
        processor: Arc<QueueProcessor>,
        dispatcher: Arc<Dispatcher>,
        projector: Arc<StatusProjector>,
    ) -> Self {
        Self {
            repo,
            lock,
            processor,
            dispatcher,
            projector,
        }
    }

    pub async fn list_status(&self) -> Result<QueueStatus, QueueError> {
        let state = self.lock.state().await?;
        let batches = self.repo.list_batches().await?;
        Ok(self.projector.project(&batches, state))
    }

    /// Kick off a chain in the background and return the current status.
    pub async fn run_all(&self) -> Result<QueueStatus, QueueError> {
        self.ensure_idle_with_work().await?;
        info!("running the whole queue on request");
        self.dispatcher.dispatch();
        self.list_status().await
    }

    /// Run one task now. It has to be at the front of its group.
    pub async fn run_task(
        &self,
        key: &BatchKey,
        group_id: &GroupId,
        task_id: &TaskId,
    ) -> Result<QueueStatus, QueueError> {
        self.ensure_idle_with_work().await?;
        let outcome = self.processor.run_single(key, group_id, task_id).await?;
        info!(batch = %key, group = %group_id, %task_id, ?outcome, "ran task on request");
        self.status_then_resume().await
    }

    /// Cancel everything that is queued.
    pub async fn delete_all(&self) -> Result<QueueStatus, QueueError> {
        self.ensure_idle_with_work().await?;
        let Some(guard) = self.lock.acquire().await? else {
            return Err(QueueError::Conflict);
        };
        let result = self.repo.delete_all().await.map_err(QueueError::from);
        let removed = self.lock.finish(guard, result).await?;
        info!(removed, "deleted all queued batches on request");
        self.status_then_resume().await
    }

    /// Remove one task; its group and batch go too when they end up empty.
    pub async fn delete_task(
        &self,
        key: &BatchKey,
        group_id: &GroupId,
        task_id: &TaskId,
    ) -> Result<QueueStatus, QueueError> {
        let Some(guard) = self.lock.acquire().await? else {
            return Err(QueueError::Conflict);
        };
        let result = self.remove_task(key, group_id, task_id).await;
        self.lock.finish(guard, result).await?;
        info!(batch = %key, group = %group_id, %task_id, "deleted task on request");
        self.status_then_resume().await
    }

    /// Chains started while this API held the lock ended as busy; anything
    /// still queued is handed back to the dispatcher once the lock is gone.
    async fn status_then_resume(&self) -> Result<QueueStatus, QueueError> {
        let status = self.list_status().await?;
        if !status.queue.is_empty() {
            self.dispatcher.dispatch();
        }
        Ok(status)
    }

    async fn remove_task(&self, key: &BatchKey, group_id: &GroupId, task_id: &TaskId) -> Result<(), QueueError> {
        let not_found = || QueueError::NotFound {
            batch: key.clone(),
            group: group_id.clone(),
            task_id: task_id.clone(),
        };

        let mut batch = self.repo.get(key).await?.ok_or_else(not_found)?;
        batch
            .groups
            .get_mut(group_id)
            .and_then(|group| group.remove(task_id))
            .ok_or_else(not_found)?;
        batch.prune_empty_groups();
        self.repo.update(key, &batch.groups).await?;
        Ok(())
    }

    async fn ensure_idle_with_work(&self) -> Result<(), QueueError> {
        if self.lock.is_running().await? {
            return Err(QueueError::Conflict);
        }
        if self.repo.is_empty().await? {
            return Err(QueueError::EmptyQueue);
        }
        Ok(())
    }
}
