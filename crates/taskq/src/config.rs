//! Scheduler configuration.
//!
//! Parsed from TOML or built from environment variables. Environment
//! variables always win over file values:
//!
//! - `TASKQ_PRIORITY_LEVELS` -> `priority_levels`
//! - `TASKQ_AUTO_RUN` -> `auto_run` (`1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`)
//! - `TASKQ_TASK_SEPARATION_MS` -> `task_separation_ms`
//! - `TASKQ_YIELD_MS` -> `yield_ms`
//!
//! Values that fail to parse are logged with `warn!` and ignored.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskqError};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Parse one override. Unset or blank is silent; anything unparseable is
/// logged and ignored.
fn parse_override<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(key)?;
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    let parsed = parse(value);
    if parsed.is_none() {
        tracing::warn!(key, value, "Ignoring unparseable config override");
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Scheduler configuration, fixed for the lifetime of a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of priority levels. External priority `1` is the highest,
    /// `priority_levels` the lowest.
    #[serde(default = "default_priority_levels")]
    pub priority_levels: usize,
    /// Start a full run whenever a task is registered and no run is active.
    #[serde(default)]
    pub auto_run: bool,
    /// Default delay between successive dequeues in a run.
    #[serde(default)]
    pub task_separation_ms: u64,
    /// Pause taken when the host reports main-thread contention.
    #[serde(default = "default_yield_ms")]
    pub yield_ms: u64,
}

fn default_priority_levels() -> usize { 3 }
fn default_yield_ms() -> u64 { 5 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            priority_levels: default_priority_levels(),
            auto_run: false,
            task_separation_ms: 0,
            yield_ms: default_yield_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Config with `levels` priority levels and every other field defaulted.
    pub fn with_levels(levels: usize) -> Self {
        Self {
            priority_levels: levels,
            ..Self::default()
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from defaults plus environment overrides (loads `.env` first).
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_overrides(env_value);
    }

    /// Apply `TASKQ_*` overrides read through `lookup`.
    ///
    /// `TASKQ_AUTO_RUN` accepts `1`/`0`, `true`/`false`, `yes`/`no` and
    /// `on`/`off`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parsed = parse_override(&lookup, "TASKQ_PRIORITY_LEVELS", |s| s.parse::<usize>().ok());
        if let Some(v) = parsed {
            self.priority_levels = v;
        }
        if let Some(v) = parse_override(&lookup, "TASKQ_AUTO_RUN", parse_bool) {
            self.auto_run = v;
        }
        let parsed = parse_override(&lookup, "TASKQ_TASK_SEPARATION_MS", |s| s.parse::<u64>().ok());
        if let Some(v) = parsed {
            self.task_separation_ms = v;
        }
        let parsed = parse_override(&lookup, "TASKQ_YIELD_MS", |s| s.parse::<u64>().ok());
        if let Some(v) = parsed {
            self.yield_ms = v;
        }
    }

    /// Validate the config.
    pub fn validate(&self) -> Result<()> {
        if self.priority_levels == 0 {
            return Err(TaskqError::InvalidConfig(
                "priority_levels must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Default task separation as a [`Duration`].
    pub fn task_separation(&self) -> Duration {
        Duration::from_millis(self.task_separation_ms)
    }

    /// Host-yield delay as a [`Duration`].
    pub fn yield_delay(&self) -> Duration {
        Duration::from_millis(self.yield_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            levels = self.priority_levels,
            auto_run = self.auto_run,
            task_separation_ms = self.task_separation_ms,
            yield_ms = self.yield_ms,
            "Scheduler config loaded"
        );
    }
}
