//! Retry policy: decides whether a failed task goes back to the front of its
//! group or is dropped.

use crate::domain::Task;

/// What happens to a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put back at the front of the group; retried on the next sweep.
    Retry { retry_count: u32 },

    /// Retries exhausted; the task is removed permanently.
    Drop { attempts: u32 },
}

/// Fixed retry ceiling, no backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Record a failed attempt on `task` and decide its fate.
    ///
    /// With `max_retries = 2`:
    /// - 1st failure: retry_count 1, retry
    /// - 2nd failure: retry_count 2, retry
    /// - 3rd failure: drop (retry_count stays 2 in whatever was persisted)
    pub fn on_failure(&self, task: &mut Task) -> RetryDecision {
        let failures = task.retry_count + 1;
        if failures > self.max_retries {
            return RetryDecision::Drop { attempts: failures };
        }
        task.retry_count = failures;
        RetryDecision::Retry {
            retry_count: failures,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}
