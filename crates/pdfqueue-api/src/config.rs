//! Process configuration read from `PDFQUEUE_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use pdfqueue_core::QueueConfig;

use crate::auth::{EDIT_SETTINGS, TokenTable};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// sled directory; `None` keeps the queue in memory.
    pub db_path: Option<PathBuf>,
    pub tokens: TokenTable,
    pub queue: QueueConfig,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = get("PDFQUEUE_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind = bind
            .parse()
            .with_context(|| format!("PDFQUEUE_BIND is not a socket address: {bind}"))?;

        let Some(admin_token) = get("PDFQUEUE_ADMIN_TOKEN") else {
            bail!("PDFQUEUE_ADMIN_TOKEN must be set");
        };
        let mut tokens = TokenTable::new().grant(admin_token, &[EDIT_SETTINGS]);
        if let Some(viewer) = get("PDFQUEUE_VIEWER_TOKEN") {
            tokens = tokens.grant(viewer, &[]);
        }

        let mut queue = QueueConfig::default();
        if let Some(identifier) = get("PDFQUEUE_IDENTIFIER") {
            queue.identifier = identifier;
        }
        if let Some(secs) = parse::<u64>(&get, "PDFQUEUE_LOCK_STALENESS_SECS")? {
            queue.lock_staleness = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&get, "PDFQUEUE_TIME_BUDGET_SECS")? {
            queue.time_budget = Duration::from_secs(secs);
        }
        queue.max_tasks_per_pass = parse::<usize>(&get, "PDFQUEUE_MAX_TASKS_PER_PASS")?;

        Ok(Self {
            bind,
            db_path: get("PDFQUEUE_DB_PATH").map(PathBuf::from),
            tokens,
            queue,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("{key} is invalid: {raw}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ApiConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_need_only_the_admin_token() {
        let config = config(&[("PDFQUEUE_ADMIN_TOKEN", "s3cret")]).unwrap();

        assert_eq!(config.bind, "0.0.0.0:8080".parse().unwrap());
        assert!(config.db_path.is_none());
        assert_eq!(config.queue.identifier, "pdf_queue");
        assert_eq!(config.queue.time_budget, Duration::from_secs(20));
        assert!(config.tokens.has_capability("s3cret", EDIT_SETTINGS));
    }

    #[test]
    fn missing_admin_token_is_an_error() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("PDFQUEUE_ADMIN_TOKEN"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config(&[
            ("PDFQUEUE_ADMIN_TOKEN", "admin"),
            ("PDFQUEUE_VIEWER_TOKEN", "viewer"),
            ("PDFQUEUE_BIND", "127.0.0.1:9000"),
            ("PDFQUEUE_DB_PATH", "/var/lib/pdfqueue"),
            ("PDFQUEUE_IDENTIFIER", "gfpdf_queue"),
            ("PDFQUEUE_LOCK_STALENESS_SECS", "60"),
            ("PDFQUEUE_TIME_BUDGET_SECS", "5"),
            ("PDFQUEUE_MAX_TASKS_PER_PASS", "10"),
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.db_path, Some(PathBuf::from("/var/lib/pdfqueue")));
        assert_eq!(config.queue.identifier, "gfpdf_queue");
        assert_eq!(config.queue.lock_staleness, Duration::from_secs(60));
        assert_eq!(config.queue.time_budget, Duration::from_secs(5));
        assert_eq!(config.queue.max_tasks_per_pass, Some(10));
        assert!(config.tokens.is_known("viewer"));
        assert!(!config.tokens.has_capability("viewer", EDIT_SETTINGS));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = config(&[("PDFQUEUE_ADMIN_TOKEN", "a"), ("PDFQUEUE_TIME_BUDGET_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("PDFQUEUE_TIME_BUDGET_SECS"));
    }
}
