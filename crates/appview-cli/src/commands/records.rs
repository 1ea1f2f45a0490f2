//! Read and delete commands over stored records

use super::{open_indexer, RecordKind};
use anyhow::{bail, Context};
use appview_core::config::IndexerConfig;
use appview_core::model::RecordUri;
use appview_store::{IndexedEntity, RecordRepository};
use clap::Args;
use serde::Serialize;

#[derive(Debug, Args)]
pub struct KindArgs {
    #[arg(long, value_enum, default_value = "preprint")]
    pub kind: RecordKind,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value = "preprint")]
    pub kind: RecordKind,

    /// Cursor printed by a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct UriArgs {
    /// Record key, `at://<did>/<collection>/<rkey>`
    pub uri: String,

    #[arg(long, value_enum, default_value = "preprint")]
    pub kind: RecordKind,
}

pub async fn count(args: KindArgs, config: &IndexerConfig) -> anyhow::Result<()> {
    let indexer = open_indexer(config)?;
    let total = match args.kind {
        RecordKind::Preprint => indexer.preprints().count().await?,
        RecordKind::Review => indexer.reviews().count().await?,
    };
    println!("{}", total);
    Ok(())
}

pub async fn list(args: ListArgs, config: &IndexerConfig) -> anyhow::Result<()> {
    let indexer = open_indexer(config)?;
    let cursor = args.cursor.as_deref();
    let page = match args.kind {
        RecordKind::Preprint => indexer.preprints().list_uris(cursor, args.limit).await?,
        RecordKind::Review => indexer.reviews().list_uris(cursor, args.limit).await?,
    };

    for uri in &page.uris {
        println!("{}", uri);
    }
    if let Some(next) = page.next_cursor {
        println!("next cursor: {}", next);
    }
    Ok(())
}

pub async fn show(args: UriArgs, config: &IndexerConfig) -> anyhow::Result<()> {
    let uri = RecordUri::parse(args.uri.as_str())?;
    let indexer = open_indexer(config)?;
    match args.kind {
        RecordKind::Preprint => print_record(indexer.preprints(), &uri).await,
        RecordKind::Review => print_record(indexer.reviews(), &uri).await,
    }
}

async fn print_record<E>(repo: &RecordRepository<E>, uri: &RecordUri) -> anyhow::Result<()>
where
    E: IndexedEntity + Serialize,
{
    match repo.find_by_uri(uri).await? {
        Some(record) => {
            let json = serde_json::to_string_pretty(&record)
                .with_context(|| format!("failed to render {}", uri))?;
            println!("{}", json);
            Ok(())
        }
        None => bail!("no {} stored at {}", E::KIND, uri),
    }
}

pub async fn delete(args: UriArgs, config: &IndexerConfig) -> anyhow::Result<()> {
    let uri = RecordUri::parse(args.uri.as_str())?;
    let indexer = open_indexer(config)?;
    match args.kind {
        RecordKind::Preprint => indexer.preprints().delete(&uri).await?,
        RecordKind::Review => indexer.reviews().delete(&uri).await?,
    }
    println!("deleted {}", uri);
    Ok(())
}
