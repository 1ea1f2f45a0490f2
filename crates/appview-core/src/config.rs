//! Indexer configuration
//!
//! Every section deserializes with defaults, so a partial TOML file or a
//! handful of environment overrides is enough. Sources are layered:
//! built-in defaults, then an optional TOML file, then `APPVIEW__*`
//! environment variables (`__` separates nesting levels, e.g.
//! `APPVIEW__BATCH__CHUNK_SIZE=500`).

use crate::errors::{ExError, ExErrorKind, Result};
use crate::logging_facility::Profile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "APPVIEW";

/// Transaction isolation level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Exponential backoff for deadlock retries
///
/// The same policy drives transaction-level and chunk-level retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total executions of a unit of work, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            multiplier: 2,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// `base * multiplier^(attempt - 1)`, capped at `max_delay_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.max_delay_ms.max(self.base_delay_ms);
        let mut delay = self.base_delay_ms;
        for _ in 1..attempt {
            delay = delay.saturating_mul(u64::from(self.multiplier)).min(cap);
        }
        Duration::from_millis(delay.min(cap))
    }

    /// Attempts actually made; a zero setting still runs the unit once
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Options for one transaction-manager unit of work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub retry: RetryPolicy,
}

impl TransactionOptions {
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Batch engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub chunk_size: usize,
    /// `true`: record per-row failures and keep going.
    /// `false`: the first failing chunk aborts the whole batch.
    pub continue_on_error: bool,
    /// Isolation and retry applied to each chunk transaction
    pub transaction: TransactionOptions,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            continue_on_error: true,
            transaction: TransactionOptions::default(),
        }
    }
}

impl BatchConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_transaction(mut self, transaction: TransactionOptions) -> Self {
        self.transaction = transaction;
        self
    }
}

/// Relational store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; `None` selects a shared in-memory database
    pub path: Option<PathBuf>,
    pub pool_size: usize,
    pub acquire_timeout_ms: u64,
    /// How long SQLite waits on a locked database before reporting busy
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 4,
            acquire_timeout_ms: 30_000,
            busy_timeout_ms: 250,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub database: DatabaseConfig,
    /// Options for single-record repository writes
    pub transaction: TransactionOptions,
    pub batch: BatchConfig,
    pub log_profile: Profile,
}

impl IndexerConfig {
    /// Load defaults, an optional TOML file, and process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like `load`, reading overrides from `env` instead of the process
    /// environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let loaded: IndexerConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.batch.chunk_size == 0 {
            return Err(ExError::invalid_input(
                "load_config",
                "batch.chunk_size must be greater than zero",
            ));
        }
        if self.database.pool_size == 0 {
            return Err(ExError::invalid_input(
                "load_config",
                "database.pool_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn config_error(err: config::ConfigError) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("load_config")
        .with_message(err.to_string())
}
