//! Connection traits and SQL dialects

use crate::db::value::{Row, SqlValue};
use crate::errors::Result;
use appview_core::config::IsolationLevel;
use async_trait::async_trait;

/// SQL flavor spoken by a connection
///
/// Statements are rendered per dialect; the differences the store cares
/// about are placeholder syntax, how isolation is requested at BEGIN, and
/// the bound-parameter limit per statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?N` placeholders
    Sqlite,
    /// `$N` placeholders
    Postgres,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", n),
            Dialect::Postgres => format!("${}", n),
        }
    }

    /// Statement opening a transaction at the requested isolation
    ///
    /// SQLite transactions are always serializable; the level instead picks
    /// how early the write lock is taken.
    pub fn begin(&self, isolation: IsolationLevel) -> &'static str {
        match (self, isolation) {
            (Dialect::Sqlite, IsolationLevel::ReadCommitted) => "BEGIN DEFERRED",
            (Dialect::Sqlite, IsolationLevel::RepeatableRead) => "BEGIN IMMEDIATE",
            (Dialect::Sqlite, IsolationLevel::Serializable) => "BEGIN EXCLUSIVE",
            (Dialect::Postgres, IsolationLevel::ReadCommitted) => {
                "BEGIN ISOLATION LEVEL READ COMMITTED"
            }
            (Dialect::Postgres, IsolationLevel::RepeatableRead) => {
                "BEGIN ISOLATION LEVEL REPEATABLE READ"
            }
            (Dialect::Postgres, IsolationLevel::Serializable) => {
                "BEGIN ISOLATION LEVEL SERIALIZABLE"
            }
        }
    }

    /// Maximum bound parameters in one statement
    pub fn max_params(&self) -> usize {
        match self {
            Dialect::Sqlite => 32_766,
            Dialect::Postgres => 65_535,
        }
    }
}

/// One live database connection
///
/// Parameters are positional and bound in order; `execute` returns the
/// number of affected rows. Implementations classify backend failures into
/// `ExErrorKind` so the transaction manager can tell deadlocks apart.
///
/// Backends over a synchronous driver must not hold the async worker while
/// waiting on a lock; `SqliteConnection` hands its worker off for the call.
#[async_trait]
pub trait Connection: Send {
    fn dialect(&self) -> Dialect;

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Whether the connection can be handed out again after release
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Opens new connections for the pool
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    }

    #[test]
    fn test_begin_statements() {
        assert_eq!(
            Dialect::Sqlite.begin(IsolationLevel::ReadCommitted),
            "BEGIN DEFERRED"
        );
        assert_eq!(
            Dialect::Postgres.begin(IsolationLevel::Serializable),
            "BEGIN ISOLATION LEVEL SERIALIZABLE"
        );
    }
}
