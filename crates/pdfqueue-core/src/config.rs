use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Prefix of every key the queue writes (`<identifier>_batch_<n>`, ...).
    pub identifier: String,

    /// Age after which a process lock is presumed abandoned.
    pub lock_staleness: Duration,

    /// Wall time one pass may spend before handing back "more work remains".
    pub time_budget: Duration,

    /// Optional cap on task attempts per pass.
    pub max_tasks_per_pass: Option<usize>,

    /// Retries after the first failed attempt (2 => 3 attempts in total).
    pub max_retries: u32,

    /// How often the dispatcher re-checks the queue on its own.
    pub healthcheck_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            identifier: "pdf_queue".to_string(),
            lock_staleness: Duration::from_secs(5 * 60),
            time_budget: Duration::from_secs(20),
            max_tasks_per_pass: None,
            max_retries: 2,
            healthcheck_interval: Duration::from_secs(5 * 60),
        }
    }
}
