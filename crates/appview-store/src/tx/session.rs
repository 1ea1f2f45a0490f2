use crate::db::{Dialect, PooledConnection, Row, SqlValue};
use crate::errors::Result;
use appview_core::config::IsolationLevel;
use appview_core::errors::{ExError, ExErrorKind};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Statement handle bound to one pooled connection
///
/// Clones share the connection. Statements issued through a session run
/// inside whatever transaction the transaction manager opened for it, or in
/// autocommit mode for `TransactionManager::with_connection`.
#[derive(Clone)]
pub struct Session {
    conn: Arc<Mutex<PooledConnection>>,
    dialect: Dialect,
}

impl Session {
    pub(crate) fn new(conn: PooledConnection) -> Self {
        Self {
            dialect: conn.dialect(),
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Run a statement, returning the number of affected rows
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.conn.lock().await.execute(sql, params).await
    }

    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.conn.lock().await.query(sql, params).await
    }

    /// First row of a query, `None` when it returns nothing
    pub async fn query_optional(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    /// First column of the first row as an integer
    pub async fn query_scalar_i64(&self, sql: &str, params: &[SqlValue]) -> Result<i64> {
        match self.query_optional(sql, params).await? {
            Some(row) => row.first_int(),
            None => Err(ExError::new(ExErrorKind::Persistence)
                .with_op("query_scalar")
                .with_message("scalar query returned no rows")),
        }
    }

    pub(crate) async fn begin(&self, isolation: IsolationLevel) -> Result<()> {
        self.conn.lock().await.begin(isolation).await
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        self.conn.lock().await.commit().await
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        self.conn.lock().await.rollback().await
    }

    pub(crate) async fn mark_broken(&self) {
        self.conn.lock().await.mark_broken();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .finish()
    }
}
