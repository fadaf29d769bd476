//! Process lock: a time-stamped exclusivity marker stored next to the batches.
//!
//! Acquisition is a compare-and-swap on the lock record, so two passes can
//! never both believe they hold a live lock. A record older than the
//! staleness threshold is treated as abandoned (the holder crashed) and may
//! be replaced.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{QueueError, StorageError};
use crate::ports::{Clock, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct LockRecord {
    acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { acquired_at: DateTime<Utc> },
}

impl LockState {
    pub fn is_locked(self) -> bool {
        matches!(self, LockState::Locked { .. })
    }
}

/// Proof of a successful `acquire()`; hand it back to `release()`.
#[derive(Debug)]
#[must_use = "a held lock must be released"]
pub struct LockGuard {
    raw: Vec<u8>,
    acquired_at: DateTime<Utc>,
}

impl LockGuard {
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

pub struct ProcessLock {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    key: String,
    staleness: Duration,
}

impl ProcessLock {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        identifier: &str,
        staleness: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            key: format!("{identifier}_process_lock"),
            staleness,
        }
    }

    pub async fn state(&self) -> Result<LockState, StorageError> {
        let (_, state) = self.read().await?;
        Ok(state)
    }

    pub async fn is_running(&self) -> Result<bool, StorageError> {
        Ok(self.state().await?.is_locked())
    }

    /// Take the lock unless a live one exists.
    pub async fn acquire(&self) -> Result<Option<LockGuard>, StorageError> {
        let (current, state) = self.read().await?;
        if let LockState::Locked { acquired_at } = state {
            debug!(%acquired_at, "process lock is held");
            return Ok(None);
        }
        if current.is_some() {
            warn!("replacing stale process lock");
        }

        let acquired_at = self.clock.now();
        let raw = serde_json::to_vec(&LockRecord { acquired_at }).map_err(StorageError::Encode)?;
        let swapped = self
            .store
            .compare_and_swap(&self.key, current.as_deref(), Some(raw.clone()))
            .await?;
        if !swapped {
            debug!("lost the race for the process lock");
            return Ok(None);
        }
        Ok(Some(LockGuard { raw, acquired_at }))
    }

    /// Delete the lock record if it is still the one this guard wrote.
    pub async fn release(&self, guard: LockGuard) -> Result<(), StorageError> {
        let released = self
            .store
            .compare_and_swap(&self.key, Some(&guard.raw), None)
            .await?;
        if !released {
            warn!(acquired_at = %guard.acquired_at, "process lock was taken over before release");
        }
        Ok(())
    }

    /// Administrative override: drop whatever lock record exists.
    pub async fn force_release(&self) -> Result<(), StorageError> {
        self.store.delete(&self.key).await
    }

    /// Release `guard` and fold the release outcome into `result`.
    ///
    /// When `result` is already an error the release is best-effort: its own
    /// failure is logged and the original error wins.
    pub async fn finish<T>(
        &self,
        guard: LockGuard,
        result: Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        match result {
            Ok(value) => {
                self.release(guard).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(release_err) = self.release(guard).await {
                    warn!(error = %release_err, "failed to release process lock after error");
                }
                Err(err)
            }
        }
    }

    async fn read(&self) -> Result<(Option<Vec<u8>>, LockState), StorageError> {
        let current = self.store.get(&self.key).await?;
        let state = match current.as_deref().map(serde_json::from_slice::<LockRecord>) {
            None => LockState::Unlocked,
            // an unreadable record cannot be aged; treat it as abandoned
            Some(Err(_)) => LockState::Unlocked,
            Some(Ok(record)) => {
                let age = self.clock.now() - record.acquired_at;
                let stale = age.to_std().map(|age| age >= self.staleness).unwrap_or(false);
                if stale {
                    LockState::Unlocked
                } else {
                    LockState::Locked {
                        acquired_at: record.acquired_at,
                    }
                }
            }
        };
        Ok((current, state))
    }
}
