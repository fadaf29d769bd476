//! Queue processor: drains batches under the process lock.
//!
//! One *pass* = one lock acquisition. Inside a pass the processor keeps
//! loading the oldest batch and sweeping its groups, attempting only the
//! front task of each group, until the queue is empty or the budget runs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::lock::ProcessLock;
use super::repository::BatchRepository;
use super::retry::{RetryDecision, RetryPolicy};
use crate::config::QueueConfig;
use crate::domain::{BatchKey, GroupId, QueueError, Task, TaskExecutionError, TaskId};
use crate::ports::Clock;
use crate::typed::FunctionRegistry;

/// Result of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing left to do.
    Drained,
    /// Budget exhausted with tasks still queued.
    MoreWork,
    /// Another pass holds the lock; nothing was touched.
    Busy,
}

/// What happened to a single attempted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Retrying { retry_count: u32 },
    Dropped,
}

/// Limits on one pass. The time limit is measured with the injected clock.
#[derive(Debug, Clone)]
pub struct PassBudget {
    pub time_limit: Duration,
    pub max_tasks: Option<usize>,
}

impl PassBudget {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            time_limit: config.time_budget,
            max_tasks: config.max_tasks_per_pass,
        }
    }
}

pub struct QueueProcessor {
    repo: Arc<BatchRepository>,
    lock: Arc<ProcessLock>,
    registry: Arc<FunctionRegistry>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    budget: PassBudget,
}

impl QueueProcessor {
    pub fn new(
        repo: Arc<BatchRepository>,
        lock: Arc<ProcessLock>,
        registry: Arc<FunctionRegistry>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        budget: PassBudget,
    ) -> Self {
        Self {
            repo,
            lock,
            registry,
            clock,
            retry,
            budget,
        }
    }

    /// Run one pass over the queue.
    ///
    /// A storage failure aborts the pass; the lock is released best-effort
    /// and the error is returned.
    pub async fn run_pass(&self) -> Result<PassOutcome, QueueError> {
        let Some(guard) = self.lock.acquire().await? else {
            return Ok(PassOutcome::Busy);
        };

        let result = self.drain().await;
        if let Err(e) = &result {
            error!(error = %e, "queue pass aborted");
        }
        self.lock.finish(guard, result).await
    }

    /// Execute exactly one task, which must be at the front of its group.
    pub async fn run_single(
        &self,
        key: &BatchKey,
        group_id: &GroupId,
        task_id: &TaskId,
    ) -> Result<TaskOutcome, QueueError> {
        let Some(guard) = self.lock.acquire().await? else {
            return Err(QueueError::Conflict);
        };
        let result = self.run_one(key, group_id, task_id).await;
        self.lock.finish(guard, result).await
    }

    async fn drain(&self) -> Result<PassOutcome, QueueError> {
        let started = self.clock.now();
        let mut attempted = 0usize;

        loop {
            let Some(mut batch) = self.repo.oldest().await? else {
                return Ok(PassOutcome::Drained);
            };
            // groups stored as `[]` would never reach update() below
            batch.prune_empty_groups();
            if batch.groups.is_empty() {
                warn!(batch = %batch.key, "batch holds no tasks; deleting it");
                self.repo.delete(&batch.key).await?;
                continue;
            }

            let key = batch.key.clone();
            let group_ids: Vec<GroupId> = batch.groups.keys().cloned().collect();
            for group_id in group_ids {
                if attempted > 0 && self.budget_exhausted(started, attempted) {
                    info!(attempted, "pass budget exhausted; more work remains");
                    return Ok(PassOutcome::MoreWork);
                }

                let Some(group) = batch.groups.get_mut(&group_id) else {
                    continue;
                };
                let Some(task) = group.pop_front() else {
                    continue;
                };

                let (_, retry) = self.attempt(&key, &group_id, task).await;
                attempted += 1;
                if let Some(task) = retry {
                    group.push_front(task);
                }

                batch.prune_empty_groups();
                self.repo.update(&key, &batch.groups).await?;
            }
        }
    }

    async fn run_one(
        &self,
        key: &BatchKey,
        group_id: &GroupId,
        task_id: &TaskId,
    ) -> Result<TaskOutcome, QueueError> {
        let not_found = || QueueError::NotFound {
            batch: key.clone(),
            group: group_id.clone(),
            task_id: task_id.clone(),
        };

        let mut batch = self.repo.get(key).await?.ok_or_else(not_found)?;
        let group = batch.groups.get_mut(group_id).ok_or_else(not_found)?;

        let at_front = group.front().is_some_and(|t| &t.id == task_id);
        if !at_front {
            return Err(if group.contains(task_id) {
                QueueError::TaskBlocked {
                    task_id: task_id.clone(),
                }
            } else {
                not_found()
            });
        }
        let Some(task) = group.pop_front() else {
            return Err(not_found());
        };

        let (outcome, retry) = self.attempt(key, group_id, task).await;
        if let Some(task) = retry {
            group.push_front(task);
        }

        batch.prune_empty_groups();
        self.repo.update(key, &batch.groups).await?;
        Ok(outcome)
    }

    /// Invoke the task's function and apply the retry policy.
    ///
    /// Returns the task back when it has to stay at the front of its group.
    async fn attempt(
        &self,
        batch: &BatchKey,
        group: &GroupId,
        mut task: Task,
    ) -> (TaskOutcome, Option<Task>) {
        info!(%batch, %group, task_id = %task.id, function = %task.function, "begin background task");

        let Some(handler) = self.registry.resolve(&task.function) else {
            error!(
                %batch, %group, task_id = %task.id, function = %task.function,
                "no handler registered for function; dropping task"
            );
            return (TaskOutcome::Dropped, None);
        };

        // run on its own tokio task so a panicking handler counts as a failure
        let args = task.args.clone();
        let result = match tokio::spawn(async move { handler.call(args).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(TaskExecutionError::Panicked(join_err.to_string())),
        };

        match result {
            Ok(()) => {
                info!(%batch, %group, task_id = %task.id, "end background task");
                (TaskOutcome::Succeeded, None)
            }
            Err(err) => match self.retry.on_failure(&mut task) {
                RetryDecision::Retry { retry_count } => {
                    warn!(
                        %batch, %group, task_id = %task.id, error = %err, retry_count,
                        "background task failed; will retry"
                    );
                    (TaskOutcome::Retrying { retry_count }, Some(task))
                }
                RetryDecision::Drop { attempts } => {
                    error!(
                        %batch, %group, task_id = %task.id, error = %err, attempts, args = ?task.args,
                        "background task failed permanently; dropping"
                    );
                    (TaskOutcome::Dropped, None)
                }
            },
        }
    }

    fn budget_exhausted(&self, started: DateTime<Utc>, attempted: usize) -> bool {
        if self.budget.max_tasks.is_some_and(|max| attempted >= max) {
            return true;
        }
        (self.clock.now() - started)
            .to_std()
            .map(|elapsed| elapsed >= self.budget.time_limit)
            .unwrap_or(false)
    }
}
