//! Command implementations

pub mod config;
pub mod ingest;
pub mod migrate;
pub mod records;

use anyhow::Context;
use appview_core::config::IndexerConfig;
use appview_core::logging_facility::OpLogger;
use appview_store::Indexer;
use clap::ValueEnum;
use std::path::{Path, PathBuf};

/// Record kind selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Preprint,
    Review,
}

/// Layered configuration with the `--db` override applied last
pub fn load_config(path: Option<&Path>, db: Option<PathBuf>) -> anyhow::Result<IndexerConfig> {
    let mut config = IndexerConfig::load(path).context("failed to load configuration")?;
    if db.is_some() {
        config.database.path = db;
    }
    Ok(config)
}

pub fn open_indexer(config: &IndexerConfig) -> anyhow::Result<Indexer> {
    Indexer::open(config, OpLogger::new("appview_cli")).context("failed to open index database")
}
