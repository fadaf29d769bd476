//! Test fixtures shared by the queue and app tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::domain::{BatchKey, FunctionRef, GroupId, PendingBatch, Task, TaskExecutionError, TaskGroup, TaskId};
use crate::impls::InMemoryStore;
use crate::ports::FixedClock;
use crate::queue::{BatchRepository, PassBudget, ProcessLock, QueueProcessor, RetryPolicy};
use crate::typed::{CleanupPdfs, CreatePdf, FunctionRegistry, Handler, SendNotification};

pub(crate) const IDENTIFIER: &str = "q";

pub(crate) fn create_pdf(id: &str, entry_id: u64) -> Task {
    Task::new(
        TaskId::new(id),
        FunctionRef::new("create_pdf"),
        vec![json!(entry_id), json!(id)],
    )
}

pub(crate) fn send_notification(id: &str, entry_id: u64) -> Task {
    Task::new(
        TaskId::new(id),
        FunctionRef::new("send_notification"),
        vec![json!(1), json!(entry_id), json!({ "name": id })],
    )
}

pub(crate) fn cleanup_pdfs(id: &str, entry_id: u64) -> Task {
    Task::new(
        TaskId::new(id),
        FunctionRef::new("cleanup_pdfs"),
        vec![json!(1), json!(entry_id)],
    )
}

/// Scriptable handler state. The task id travels in the call args
/// (`pdf_id` / notification name) so the probe can look its task up.
pub(crate) struct Probe {
    clock: Arc<FixedClock>,
    repo: Arc<BatchRepository>,
    peer: Option<Arc<Probe>>,
    calls: AtomicU32,
    fail_remaining: AtomicU32,
    panic_remaining: AtomicU32,
    advance_by: Mutex<Option<chrono::Duration>>,
    broken_store: Mutex<Option<Arc<InMemoryStore>>>,
    retry_counts: Mutex<Vec<u32>>,
    peer_calls_at_first_call: Mutex<Option<u32>>,
}

impl Probe {
    fn new(clock: Arc<FixedClock>, repo: Arc<BatchRepository>, peer: Option<Arc<Probe>>) -> Self {
        Self {
            clock,
            repo,
            peer,
            calls: AtomicU32::new(0),
            fail_remaining: AtomicU32::new(0),
            panic_remaining: AtomicU32::new(0),
            advance_by: Mutex::new(None),
            broken_store: Mutex::new(None),
            retry_counts: Mutex::new(Vec::new()),
            peer_calls_at_first_call: Mutex::new(None),
        }
    }

    pub fn fail_times(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn panic_times(&self, n: u32) {
        self.panic_remaining.store(n, Ordering::SeqCst);
    }

    pub fn advance_clock_on_call(&self, by: chrono::Duration) {
        *self.advance_by.lock().unwrap() = Some(by);
    }

    pub fn break_store_on_call(&self, store: Arc<InMemoryStore>) {
        *self.broken_store.lock().unwrap() = Some(store);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Persisted retry count of the task at the moment of each call.
    pub fn retry_counts_seen(&self) -> Vec<u32> {
        self.retry_counts.lock().unwrap().clone()
    }

    /// How many calls the peer probe had seen when this one was first called.
    pub fn pdf_calls_before_first_call(&self) -> Option<u32> {
        *self.peer_calls_at_first_call.lock().unwrap()
    }

    async fn record(&self, task_id: &str) -> Result<(), TaskExecutionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(peer) = &self.peer {
                *self.peer_calls_at_first_call.lock().unwrap() = Some(peer.calls());
            }
        }

        let seen = self
            .repo
            .list_batches()
            .await
            .unwrap()
            .iter()
            .flat_map(|b| b.groups.values().flat_map(|g| g.iter().cloned()).collect::<Vec<_>>())
            .find(|t| t.id.as_str() == task_id)
            .map(|t| t.retry_count)
            .unwrap_or(0);
        self.retry_counts.lock().unwrap().push(seen);

        if let Some(by) = *self.advance_by.lock().unwrap() {
            self.clock.advance(by);
        }
        if let Some(store) = self.broken_store.lock().unwrap().take() {
            store.fail_writes(true);
        }
        if take_one(&self.panic_remaining) {
            panic!("renderer crashed");
        }
        if take_one(&self.fail_remaining) {
            return Err(TaskExecutionError::failed("render failed"));
        }
        Ok(())
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub(crate) struct ProbeHandler(pub Arc<Probe>);

#[async_trait]
impl Handler<CreatePdf> for ProbeHandler {
    async fn handle(&self, call: CreatePdf) -> Result<(), TaskExecutionError> {
        self.0.record(&call.pdf_id).await
    }
}

#[async_trait]
impl Handler<SendNotification> for ProbeHandler {
    async fn handle(&self, call: SendNotification) -> Result<(), TaskExecutionError> {
        self.0.record(&call.notification.name).await
    }
}

#[async_trait]
impl Handler<CleanupPdfs> for ProbeHandler {
    async fn handle(&self, _call: CleanupPdfs) -> Result<(), TaskExecutionError> {
        self.0.record("").await
    }
}

/// In-memory queue wired with probe handlers for all three functions.
pub(crate) struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub repo: Arc<BatchRepository>,
    pub lock: Arc<ProcessLock>,
    pub processor: Arc<QueueProcessor>,
    pub pdf: Arc<Probe>,
    pub notifications: Arc<Probe>,
    pub cleanup: Arc<Probe>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_budget(PassBudget {
            time_limit: Duration::from_secs(20),
            max_tasks: None,
        })
    }

    pub fn with_budget(budget: PassBudget) -> Self {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
        let store = Arc::new(InMemoryStore::new());
        let repo = Arc::new(BatchRepository::new(store.clone(), clock.clone(), IDENTIFIER));
        let lock = Arc::new(ProcessLock::new(
            store.clone(),
            clock.clone(),
            IDENTIFIER,
            Duration::from_secs(300),
        ));

        let pdf = Arc::new(Probe::new(clock.clone(), repo.clone(), None));
        let notifications = Arc::new(Probe::new(clock.clone(), repo.clone(), Some(pdf.clone())));
        let cleanup = Arc::new(Probe::new(clock.clone(), repo.clone(), None));

        let mut registry = FunctionRegistry::new();
        registry
            .register::<CreatePdf, _>(ProbeHandler(pdf.clone()))
            .unwrap();
        registry
            .register::<SendNotification, _>(ProbeHandler(notifications.clone()))
            .unwrap();
        registry
            .register::<CleanupPdfs, _>(ProbeHandler(cleanup.clone()))
            .unwrap();

        let processor = Arc::new(QueueProcessor::new(
            repo.clone(),
            lock.clone(),
            Arc::new(registry),
            clock.clone(),
            RetryPolicy::default(),
            budget,
        ));

        Self {
            store,
            clock,
            repo,
            lock,
            processor,
            pdf,
            notifications,
            cleanup,
        }
    }

    /// Save one batch made of the given groups (in order).
    pub async fn enqueue(&self, groups: &[(&str, Vec<Task>)]) -> BatchKey {
        let mut pending = PendingBatch::new();
        for (group_id, tasks) in groups {
            pending.push(GroupId::new(*group_id), tasks.iter().cloned().collect::<TaskGroup>());
        }
        self.repo.save(pending).await.unwrap().unwrap()
    }
}
