use anyhow::Context;
use appview_core::config::IndexerConfig;
use appview_store::SqliteConnector;

pub fn execute(config: &IndexerConfig) -> anyhow::Result<()> {
    let database = &config.database;
    let connector = match &database.path {
        Some(path) => SqliteConnector::open(path, database.busy_timeout())
            .with_context(|| format!("failed to migrate {}", path.display()))?,
        None => {
            eprintln!("no database path configured; migrating a throwaway in-memory database");
            SqliteConnector::in_memory(database.busy_timeout())?
        }
    };

    for id in connector.applied_migrations()? {
        println!("{}", id);
    }
    Ok(())
}
