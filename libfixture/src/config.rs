//! Runtime configuration for the TLS demonstration program. The program takes no arguments, so
//! everything here comes from environment variables.

use crate::error::Result;
use anyhow::Context as _;
use anyhow::bail;
use std::num::NonZeroUsize;

/// Overrides the number of worker threads.
pub const WORKERS_ENV: &str = "TLS_DEMO_WORKERS";

/// When set to `1` or `true`, wait for a key press after all workers have been joined.
pub const PAUSE_ENV: &str = "TLS_DEMO_PAUSE";

pub const DEFAULT_WORKER_COUNT: NonZeroUsize = NonZeroUsize::MIN.saturating_add(4);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub worker_count: NonZeroUsize,
    pub pause_before_exit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            pause_before_exit: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `lookup`, which maps a variable name to its value, if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(value) = lookup(WORKERS_ENV) {
            config.worker_count = value.trim().parse().with_context(|| {
                format!("{WORKERS_ENV} must be a positive integer, got `{value}`")
            })?;
        }

        if let Some(value) = lookup(PAUSE_ENV) {
            config.pause_before_exit = parse_flag(&value)
                .with_context(|| format!("Invalid value for {PAUSE_ENV}"))?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Expected a boolean, got `{other}`"),
    }
}
