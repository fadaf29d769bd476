//! Batch model: groups of tasks persisted together under one store key.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BatchKey, GroupId, TaskId};
use super::task::{Task, TaskGroup};

/// Group id -> group. A `BTreeMap` keeps iteration order stable across
/// reads, which is what the processor and the status view rely on.
pub type Groups = BTreeMap<GroupId, TaskGroup>;

/// A persisted batch.
///
/// `timestamp` is fixed at creation; only `groups` changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub key: BatchKey,
    pub timestamp: DateTime<Utc>,
    pub groups: Groups,
}

impl Batch {
    pub fn from_record(key: BatchKey, record: BatchRecord) -> Self {
        Self {
            key,
            timestamp: record.timestamp,
            groups: record.data,
        }
    }

    pub fn task_count(&self) -> usize {
        self.groups.values().map(TaskGroup::len).sum()
    }

    pub fn find_task(&self, group_id: &GroupId, task_id: &TaskId) -> Option<&Task> {
        self.groups
            .get(group_id)?
            .iter()
            .find(|t| &t.id == task_id)
    }

    /// Drop groups that ran out of tasks.
    pub fn prune_empty_groups(&mut self) {
        self.groups.retain(|_, group| !group.is_empty());
    }
}

/// Value stored under a batch key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub timestamp: DateTime<Utc>,
    pub data: Groups,
}

/// Groups collected by a producer before the batch is saved.
#[derive(Debug, Clone, Default)]
pub struct PendingBatch {
    groups: Groups,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a group. Empty groups are ignored.
    pub fn push(&mut self, group_id: GroupId, group: TaskGroup) -> &mut Self {
        if !group.is_empty() {
            self.groups.insert(group_id, group);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn into_groups(self) -> Groups {
        self.groups
    }
}
