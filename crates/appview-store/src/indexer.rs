//! Wiring of the store components
//!
//! `Indexer` owns one connection pool and hands out the transaction manager,
//! batch engine and repositories built on it.

use crate::batch::BatchEngine;
use crate::db::{ConnectionPool, Connector, SqliteConnector};
use crate::errors::Result;
use crate::repo::{PreprintRepository, ReviewRepository};
use crate::tx::TransactionManager;
use appview_core::config::IndexerConfig;
use appview_core::logging_facility::OpLogger;
use std::sync::Arc;

#[derive(Clone)]
pub struct Indexer {
    pool: Arc<ConnectionPool>,
    tx: TransactionManager,
    batch: BatchEngine,
    preprints: PreprintRepository,
    reviews: ReviewRepository,
}

impl Indexer {
    /// Open (and migrate) the SQLite database named by the configuration
    ///
    /// Without a configured path the index lives in a private in-memory
    /// database that disappears with the `Indexer`.
    pub fn open(config: &IndexerConfig, logger: OpLogger) -> Result<Self> {
        let database = &config.database;
        let connector = match &database.path {
            Some(path) => SqliteConnector::open(path, database.busy_timeout())?,
            None => SqliteConnector::in_memory(database.busy_timeout())?,
        };

        logger.in_scope(|| {
            tracing::info!(
                component = logger.component(),
                path = ?database.path,
                pool_size = database.pool_size,
                "opened index database"
            );
        });

        Self::from_connector(Arc::new(connector), config, logger)
    }

    /// Build on an arbitrary connector; migrations are the connector's job
    ///
    /// # Errors
    ///
    /// `Internal` when the connection pool cannot be built.
    pub fn from_connector(
        connector: Arc<dyn Connector>,
        config: &IndexerConfig,
        logger: OpLogger,
    ) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::new(
            connector,
            config.database.pool_size,
            config.database.acquire_timeout(),
            logger.clone(),
        )?);
        let tx = TransactionManager::new(pool.clone(), logger.clone());

        Ok(Self {
            batch: BatchEngine::new(tx.clone(), logger.clone()),
            preprints: PreprintRepository::new(
                tx.clone(),
                config.transaction.clone(),
                logger.clone(),
            ),
            reviews: ReviewRepository::new(tx.clone(), config.transaction.clone(), logger),
            pool,
            tx,
        })
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.tx
    }

    pub fn batch(&self) -> &BatchEngine {
        &self.batch
    }

    pub fn preprints(&self) -> &PreprintRepository {
        &self.preprints
    }

    pub fn reviews(&self) -> &ReviewRepository {
        &self.reviews
    }
}
