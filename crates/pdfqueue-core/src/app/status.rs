//! Status - queue の表示用ビュー
//!
//! batch（新しい順）を UI がそのまま描画できる行に変換する純粋な関数です。
//! 引数の表示は function ごとの `ArgsFormatter` で決まり、host が追加できます。
//! 表示名も function ごとに差し替えられます（未登録なら short name）。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Batch, Task};
use crate::queue::LockState;

/// One queued task as the UI shows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRow {
    /// `<option_id>/<queue_id>/<task_id>`
    pub id: String,
    pub option_id: String,
    pub queue_id: String,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    pub status: String,
    pub queue: String,
    pub first_in_group: bool,
}

/// Lock state plus rows, one inner list per task group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    #[serde(rename = "status")]
    pub running: bool,
    pub queue: Vec<Vec<StatusRow>>,
}

impl QueueStatus {
    pub fn rows(&self) -> impl Iterator<Item = &StatusRow> {
        self.queue.iter().flatten()
    }
}

/// Turns a task's positional args into display fragments.
pub trait ArgsFormatter: Send + Sync {
    fn format(&self, args: &[Value]) -> Vec<String>;
}

impl<F> ArgsFormatter for F
where
    F: Fn(&[Value]) -> Vec<String> + Send + Sync,
{
    fn format(&self, args: &[Value]) -> Vec<String> {
        self(args)
    }
}

pub struct StatusProjector {
    formatters: HashMap<String, Arc<dyn ArgsFormatter>>,
    names: HashMap<String, String>,
}

impl StatusProjector {
    /// A projector without any humanizers; args are shown raw.
    pub fn bare() -> Self {
        Self {
            formatters: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Add (or replace) the formatter for `function` (short name).
    pub fn with_formatter(mut self, function: impl Into<String>, formatter: impl ArgsFormatter + 'static) -> Self {
        self.formatters.insert(function.into(), Arc::new(formatter));
        self
    }

    /// Show `name` in place of `function` (short name).
    pub fn with_display_name(mut self, function: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(function.into(), name.into());
        self
    }

    pub fn project(&self, batches: &[Batch], lock: LockState) -> QueueStatus {
        let running = lock.is_locked();
        let base_status = if running { "Processing" } else { "Pending" };

        let queue = batches
            .iter()
            .flat_map(|batch| {
                batch.groups.iter().map(move |(group_id, group)| {
                    group
                        .iter()
                        .enumerate()
                        .map(|(position, task)| StatusRow {
                            id: format!("{}/{}/{}", batch.key, group_id, task.id),
                            option_id: batch.key.to_string(),
                            queue_id: group_id.to_string(),
                            task_id: task.id.to_string(),
                            timestamp: batch.timestamp,
                            retry_count: task.retry_count,
                            status: status_label(base_status, task.retry_count),
                            queue: self.describe(task),
                            first_in_group: position == 0,
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        QueueStatus { running, queue }
    }

    fn describe(&self, task: &Task) -> String {
        let name = task.function.short_name();
        let args = match self.formatters.get(name) {
            Some(formatter) => formatter.format(&task.args),
            None => task.args.iter().map(display_value).collect(),
        };
        let label = self.names.get(name).map(String::as_str).unwrap_or(name);
        format!("{label} ({})", args.join(", "))
    }
}

impl Default for StatusProjector {
    fn default() -> Self {
        Self::bare()
            .with_formatter("create_pdf", |args: &[Value]| labelled(args, &["Entry", "PDF"]))
            .with_formatter("send_notification", notification_args)
            .with_formatter("cleanup_pdfs", |args: &[Value]| labelled(args, &["Form", "Entry"]))
    }
}

fn status_label(base: &str, retry_count: u32) -> String {
    match retry_count {
        0 => base.to_string(),
        1 => "1 Failure".to_string(),
        n => format!("{n} Failures"),
    }
}

fn labelled(args: &[Value], labels: &[&str]) -> Vec<String> {
    args.iter()
        .enumerate()
        .map(|(i, arg)| match labels.get(i) {
            Some(label) => format!("{label}: {}", display_value(arg)),
            None => display_value(arg),
        })
        .collect()
}

fn notification_args(args: &[Value]) -> Vec<String> {
    let mut out = labelled(args, &["Form", "Entry"]);
    if let (Some(slot), Some(notification)) = (out.get_mut(2), args.get(2)) {
        let name = notification.get("name").map(display_value).unwrap_or_default();
        *slot = format!("Name: {name}");
    }
    out
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchKey, FunctionRef, GroupId, Groups, TaskGroup, TaskId};
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn task(id: &str, function: &str, args: Vec<Value>, retry_count: u32) -> Task {
        let mut task = Task::new(TaskId::new(id), FunctionRef::new(function), args);
        task.retry_count = retry_count;
        task
    }

    fn batch(seq: u64, groups: Vec<(&str, Vec<Task>)>) -> Batch {
        Batch {
            key: BatchKey::from_sequence("q", seq),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            groups: groups
                .into_iter()
                .map(|(id, tasks)| (GroupId::new(id), tasks.into_iter().collect::<TaskGroup>()))
                .collect::<Groups>(),
        }
    }

    #[rstest]
    #[case("create_pdf", vec![json!(12), json!("5f1")], "create_pdf (Entry: 12, PDF: 5f1)")]
    #[case(
        "\\GFPDF\\Statics\\Queue_Callbacks::send_notification",
        vec![json!(3), json!(12), json!({"name": "Admin", "to": "a@b.c"})],
        "send_notification (Form: 3, Entry: 12, Name: Admin)"
    )]
    #[case("cleanup_pdfs", vec![json!(3), json!(12)], "cleanup_pdfs (Form: 3, Entry: 12)")]
    #[case("reindex", vec![json!(7), json!("x")], "reindex (7, x)")]
    fn functions_are_humanized(#[case] function: &str, #[case] args: Vec<Value>, #[case] expected: &str) {
        let batches = vec![batch(1, vec![("g", vec![task("t", function, args, 0)])])];
        let status = StatusProjector::default().project(&batches, LockState::Unlocked);
        assert_eq!(status.rows().next().unwrap().queue, expected);
    }

    #[rstest]
    #[case(0, false, "Pending")]
    #[case(0, true, "Processing")]
    #[case(1, false, "1 Failure")]
    #[case(2, true, "2 Failures")]
    fn status_reflects_lock_and_failures(#[case] retry_count: u32, #[case] locked: bool, #[case] expected: &str) {
        let lock = if locked {
            LockState::Locked {
                acquired_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            }
        } else {
            LockState::Unlocked
        };
        let batches = vec![batch(1, vec![("g", vec![task("t", "create_pdf", vec![], retry_count)])])];

        let status = StatusProjector::default().project(&batches, lock);

        assert_eq!(status.running, locked);
        assert_eq!(status.rows().next().unwrap().status, expected);
    }

    #[test]
    fn rows_are_grouped_per_task_group_in_batch_order() {
        let batches = vec![
            batch(2, vec![("g3", vec![task("c", "create_pdf", vec![], 0)])]),
            batch(
                1,
                vec![
                    ("g1", vec![task("a1", "create_pdf", vec![], 0), task("a2", "cleanup_pdfs", vec![], 0)]),
                    ("g2", vec![task("b", "create_pdf", vec![], 0)]),
                ],
            ),
        ];

        let status = StatusProjector::default().project(&batches, LockState::Unlocked);

        let ids: Vec<Vec<&str>> = status
            .queue
            .iter()
            .map(|group| group.iter().map(|r| r.task_id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["c"], vec!["a1", "a2"], vec!["b"]]);

        let a2 = &status.queue[1][1];
        assert_eq!(a2.id, "q_batch_00000000000000000001/g1/a2");
        assert_eq!(a2.queue_id, "g1");
        assert!(!a2.first_in_group);
        assert!(status.queue[1][0].first_in_group);
    }

    #[test]
    fn hosts_can_override_formatters() {
        let projector = StatusProjector::default()
            .with_formatter("create_pdf", |args: &[Value]| vec![format!("entry #{}", args[0])]);
        let batches = vec![batch(1, vec![("g", vec![task("t", "create_pdf", vec![json!(9)], 0)])])];

        let status = projector.project(&batches, LockState::Unlocked);

        assert_eq!(status.rows().next().unwrap().queue, "create_pdf (entry #9)");
    }

    #[test]
    fn display_names_replace_the_function_name() {
        let projector = StatusProjector::default().with_display_name("send_notification", "Notification");
        let batches = vec![batch(
            1,
            vec![(
                "g",
                vec![
                    task("n", "\\GFPDF\\Statics\\Queue_Callbacks::send_notification", vec![json!(3), json!(12)], 0),
                    task("c", "cleanup_pdfs", vec![json!(3), json!(12)], 0),
                ],
            )],
        )];

        let status = projector.project(&batches, LockState::Unlocked);

        let labels: Vec<&str> = status.rows().map(|r| r.queue.as_str()).collect();
        assert_eq!(labels, vec!["Notification (Form: 3, Entry: 12)", "cleanup_pdfs (Form: 3, Entry: 12)"]);
    }

    #[test]
    fn serializes_with_the_ui_field_names() {
        let status = StatusProjector::default().project(&[], LockState::Unlocked);
        assert_eq!(serde_json::to_value(&status).unwrap(), json!({"status": false, "queue": []}));
    }
}
