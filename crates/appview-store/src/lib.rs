//! AppView Store - transactional write path of the index
//!
//! Provides:
//! - Connection traits, a bounded pool and the SQLite backend
//! - Embedded schema migrations with checksum verification
//! - A dialect-aware SQL builder for idempotent upserts and batch updates
//! - The transaction manager (isolation, deadlock retry, savepoints)
//! - The batch engine (chunking, fast/slow paths, ordinal failure tracking)
//! - Repositories translating records to rows and back

pub mod batch;
pub mod db;
pub mod errors;
pub mod indexer;
pub mod migrations;
pub mod repo;
pub mod sql;
pub mod tx;

pub use batch::{BatchEngine, FieldUpdate};
pub use db::{Connection, Connector, Dialect, SqlValue, SqliteConnector};
pub use errors::Result;
pub use indexer::Indexer;
pub use repo::{IndexedEntity, PreprintRepository, RecordRepository, ReviewRepository, UriPage};
pub use tx::{Session, TransactionManager};
