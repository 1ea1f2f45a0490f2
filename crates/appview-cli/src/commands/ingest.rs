//! Bulk ingest of newline-delimited JSON records

use super::{open_indexer, RecordKind};
use anyhow::Context;
use appview_core::config::{BatchConfig, IndexerConfig};
use appview_core::model::{Preprint, Review};
use appview_store::{Indexer, IndexedEntity};
use clap::Args;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// File with one JSON record per line
    pub file: PathBuf,

    #[arg(long, value_enum, default_value = "preprint")]
    pub kind: RecordKind,

    /// Records per transaction; defaults to `batch.chunk_size`
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Abort on the first failing chunk instead of recording row failures
    #[arg(long)]
    pub fail_fast: bool,
}

/// Records parsed from an NDJSON file, with the line each came from
struct Parsed<E> {
    items: Vec<E>,
    lines: Vec<usize>,
    rejected: usize,
}

fn parse_file<E: DeserializeOwned>(path: &Path) -> anyhow::Result<Parsed<E>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut parsed = Parsed {
        items: Vec::new(),
        lines: Vec::new(),
        rejected: 0,
    };
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<E>(line) {
            Ok(item) => {
                parsed.items.push(item);
                parsed.lines.push(index + 1);
            }
            Err(e) => {
                eprintln!("line {}: {}", index + 1, e);
                parsed.rejected += 1;
            }
        }
    }
    Ok(parsed)
}

pub async fn execute(args: IngestArgs, config: &IndexerConfig) -> anyhow::Result<()> {
    let indexer = open_indexer(config)?;

    let mut batch = config
        .batch
        .clone()
        .with_continue_on_error(!args.fail_fast);
    if let Some(chunk_size) = args.chunk_size {
        batch = batch.with_chunk_size(chunk_size);
    }

    match args.kind {
        RecordKind::Preprint => ingest::<Preprint>(&indexer, &args.file, &batch).await,
        RecordKind::Review => ingest::<Review>(&indexer, &args.file, &batch).await,
    }
}

async fn ingest<E>(
    indexer: &Indexer,
    path: &Path,
    batch: &BatchConfig,
) -> anyhow::Result<()>
where
    E: IndexedEntity + DeserializeOwned,
{
    let parsed = parse_file::<E>(path)?;

    let outcome = indexer
        .batch()
        .batch_upsert(&parsed.items, batch, |processed, total| {
            tracing::info!(kind = E::KIND, processed, total, "ingest progress");
        })
        .await
        .with_context(|| format!("ingest of {} aborted", path.display()))?;

    println!("kind: {}", E::KIND);
    println!("total: {}", outcome.total_count);
    println!("succeeded: {}", outcome.success_count);
    println!("failed: {}", outcome.failure_count);
    println!("unparsable lines: {}", parsed.rejected);
    println!("duration_ms: {}", outcome.duration_ms);

    if !outcome.failures.is_empty() {
        let ordinals: Vec<String> = outcome
            .failed_indices()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("failed ordinals: {}", ordinals.join(","));
        for failure in &outcome.failures {
            let line = parsed.lines.get(failure.index).copied().unwrap_or_default();
            println!(
                "  #{} (line {}) {}: {}",
                failure.index,
                line,
                failure.item.key(),
                failure.error
            );
        }
    }
    Ok(())
}
