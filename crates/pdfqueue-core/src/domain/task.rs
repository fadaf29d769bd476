//! Task and task group models.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Name of the operation a task invokes.
///
/// Producers may store a namespaced name such as
/// `Pdf\Queue_Callbacks::create_pdf`; the registry resolves the full name and
/// the status view shows only the part after the last `::`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionRef(String);

impl FunctionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without any `Namespace::` qualifier.
    pub fn short_name(&self) -> &str {
        match self.0.rsplit_once("::") {
            Some((_, name)) => name,
            None => &self.0,
        }
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single deferred operation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    #[serde(rename = "func")]
    pub function: FunctionRef,

    #[serde(default)]
    pub args: Vec<serde_json::Value>,

    /// Number of failed attempts so far.
    #[serde(rename = "retry", default, skip_serializing_if = "is_zero")]
    pub retry_count: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Task {
    pub fn new(id: TaskId, function: FunctionRef, args: Vec<serde_json::Value>) -> Self {
        Self {
            id,
            function,
            args,
            retry_count: 0,
        }
    }
}

/// Ordered list of tasks executed front-to-back.
///
/// Only the front task is ever attempted: later tasks may depend on what an
/// earlier one produced (the notification needs the rendered PDF).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskGroup {
    tasks: VecDeque<Task>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn front(&self) -> Option<&Task> {
        self.tasks.front()
    }

    pub fn pop_front(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn push_front(&mut self, task: Task) {
        self.tasks.push_front(task);
    }

    pub fn push_back(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.iter().any(|t| &t.id == task_id)
    }

    /// Remove a task wherever it sits in the group.
    pub fn remove(&mut self, task_id: &TaskId) -> Option<Task> {
        let index = self.tasks.iter().position(|t| &t.id == task_id)?;
        self.tasks.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<Task> for TaskGroup {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: &str) -> Task {
        Task::new(TaskId::new(id), FunctionRef::new("create_pdf"), vec![json!(1)])
    }

    #[test]
    fn short_name_strips_namespace() {
        let f = FunctionRef::new("Pdf\\Statics\\Queue_Callbacks::create_pdf");
        assert_eq!(f.short_name(), "create_pdf");
        assert_eq!(FunctionRef::new("cleanup_pdfs").short_name(), "cleanup_pdfs");
    }

    #[test]
    fn retry_is_omitted_until_first_failure() {
        let mut t = task("a");
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value, json!({"id": "a", "func": "create_pdf", "args": [1]}));

        t.retry_count = 2;
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["retry"], 2);
    }

    #[test]
    fn group_remove_keeps_order_of_the_rest() {
        let mut group: TaskGroup = [task("a"), task("b"), task("c")].into_iter().collect();
        let removed = group.remove(&TaskId::new("b")).unwrap();

        assert_eq!(removed.id.as_str(), "b");
        let ids: Vec<_> = group.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert!(group.remove(&TaskId::new("zzz")).is_none());
    }
}
