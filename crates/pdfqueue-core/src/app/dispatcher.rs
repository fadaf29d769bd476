//! Dispatcher - processor を queue が空になるまで回し続ける background task
//!
//! - `dispatch()` は fire-and-forget。未処理の request があればそれに合流する
//! - `dispatch_and_wait()` は chain の結果（`ChainReport`）を待つ
//! - `healthcheck_interval` ごとに自発的に chain を起動する
//! - `shutdown()` は pass と pass の間で止めて task を join する

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::queue::{PassOutcome, QueueProcessor};

const REQUEST_BUFFER: usize = 16;

/// Why a chain stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEnd {
    Drained,
    /// Another pass holds the lock and will carry on.
    Busy,
    Failed(String),
    ShutDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Passes attempted, including the one that ended the chain.
    pub passes: usize,
    pub end: ChainEnd,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher has stopped")]
    Stopped,
}

struct RunRequest {
    reply: Option<oneshot::Sender<ChainReport>>,
}

pub struct Dispatcher {
    requests: mpsc::Sender<RunRequest>,
    shutdown_tx: watch::Sender<bool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the dispatch loop on the current tokio runtime.
    pub fn spawn(processor: Arc<QueueProcessor>, healthcheck_interval: Duration) -> Self {
        let (requests, rx) = mpsc::channel(REQUEST_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(dispatch_loop(processor, rx, shutdown_rx, healthcheck_interval));

        Self {
            requests,
            shutdown_tx,
            join: Mutex::new(Some(join)),
        }
    }

    /// Ask for a chain without waiting for it.
    pub fn dispatch(&self) {
        match self.requests.try_send(RunRequest { reply: None }) {
            Ok(()) => {}
            // plenty of requests are already waiting; they start the same chain
            Err(mpsc::error::TrySendError::Full(_)) => debug!("dispatch coalesced with pending requests"),
            Err(mpsc::error::TrySendError::Closed(_)) => warn!("dispatch requested after shutdown"),
        }
    }

    /// Ask for a chain and wait for its report.
    pub async fn dispatch_and_wait(&self) -> Result<ChainReport, DispatchError> {
        let (reply, report) = oneshot::channel();
        self.requests
            .send(RunRequest { reply: Some(reply) })
            .await
            .map_err(|_| DispatchError::Stopped)?;
        report.await.map_err(|_| DispatchError::Stopped)
    }

    /// Stop after the current pass and wait for the loop to exit.
    pub async fn shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
        if let Some(join) = self.join.lock().await.take() {
            if let Err(e) = join.await {
                error!(error = %e, "dispatcher task ended abnormally");
            }
        }
    }
}

async fn dispatch_loop(
    processor: Arc<QueueProcessor>,
    mut requests: mpsc::Receiver<RunRequest>,
    mut shutdown_rx: watch::Receiver<bool>,
    healthcheck_interval: Duration,
) {
    let start = tokio::time::Instant::now() + healthcheck_interval;
    let mut healthcheck = tokio::time::interval_at(start, healthcheck_interval);
    healthcheck.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let mut waiters = Vec::new();
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            request = requests.recv() => match request {
                Some(request) => waiters.extend(request.reply),
                None => break,
            },
            _ = healthcheck.tick() => debug!("healthcheck: starting chain"),
        }

        // everything that queued up meanwhile rides on this chain
        while let Ok(request) = requests.try_recv() {
            waiters.extend(request.reply);
        }

        let report = run_chain(&processor, &shutdown_rx).await;
        debug!(passes = report.passes, end = ?report.end, "chain finished");
        for waiter in waiters {
            let _ = waiter.send(report.clone());
        }
    }
    debug!("dispatcher stopped");
}

async fn run_chain(processor: &QueueProcessor, shutdown_rx: &watch::Receiver<bool>) -> ChainReport {
    let mut passes = 0;
    loop {
        if *shutdown_rx.borrow() {
            return ChainReport {
                passes,
                end: ChainEnd::ShutDown,
            };
        }

        passes += 1;
        let end = match processor.run_pass().await {
            Ok(PassOutcome::MoreWork) => {
                debug!(passes, "more work remains; continuing chain");
                continue;
            }
            Ok(PassOutcome::Drained) => ChainEnd::Drained,
            Ok(PassOutcome::Busy) => {
                debug!("queue is locked by another pass; leaving it the work");
                ChainEnd::Busy
            }
            Err(e) => {
                error!(error = %e, "queue pass failed; chain stopped");
                ChainEnd::Failed(e.to_string())
            }
        };
        return ChainReport { passes, end };
    }
}
