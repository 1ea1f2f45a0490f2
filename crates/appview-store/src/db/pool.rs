//! Bounded connection pool
//!
//! Built on a `deadpool` managed pool over the `Connector` trait. Released
//! connections are recycled for reuse; one released while still inside a
//! transaction, or marked broken, is detached from the pool and closed.

use crate::db::connection::{Connection, Connector, Dialect};
use crate::db::value::{Row, SqlValue};
use crate::errors::Result;
use appview_core::config::IsolationLevel;
use appview_core::errors::{ExError, ExErrorKind};
use appview_core::logging_facility::OpLogger;
use deadpool::managed::{self, Metrics, Object, PoolError, RecycleError, RecycleResult};
use deadpool::Runtime;
use std::sync::Arc;
use std::time::Duration;

/// Opens pool members through a `Connector`
pub struct ConnectorManager {
    connector: Arc<dyn Connector>,
    logger: OpLogger,
}

impl managed::Manager for ConnectorManager {
    type Type = Box<dyn Connection>;
    type Error = ExError;

    async fn create(&self) -> Result<Box<dyn Connection>> {
        let conn = self.connector.connect().await?;
        self.logger.in_scope(|| {
            tracing::debug!(component = self.logger.component(), "opened connection");
        });
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut Box<dyn Connection>, _: &Metrics) -> RecycleResult<ExError> {
        if conn.is_healthy() {
            Ok(())
        } else {
            Err(RecycleError::Backend(
                ExError::new(ExErrorKind::Connection)
                    .with_op("pool_recycle")
                    .with_message("connection reported unhealthy"),
            ))
        }
    }
}

/// Snapshot of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub in_use: usize,
    pub idle: usize,
}

pub struct ConnectionPool {
    pool: managed::Pool<ConnectorManager>,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    /// # Errors
    ///
    /// `Internal` when the pool cannot be assembled.
    pub fn new(
        connector: Arc<dyn Connector>,
        max_size: usize,
        acquire_timeout: Duration,
        logger: OpLogger,
    ) -> Result<Self> {
        let manager = ConnectorManager {
            connector,
            logger: logger.child("connection_pool"),
        };
        let pool = managed::Pool::builder(manager)
            .max_size(max_size.max(1))
            .wait_timeout(Some(acquire_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| {
                ExError::new(ExErrorKind::Internal)
                    .with_op("pool_build")
                    .with_message(e.to_string())
            })?;

        Ok(Self {
            pool,
            acquire_timeout,
        })
    }

    /// Check out a connection, waiting at most the acquire timeout
    ///
    /// # Errors
    ///
    /// `Timeout` when every connection stays checked out past the timeout;
    /// connector errors when a new connection cannot be opened.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        match self.pool.get().await {
            Ok(conn) => Ok(PooledConnection::new(conn)),
            Err(PoolError::Backend(err)) => Err(err),
            Err(PoolError::Timeout(_)) => Err(ExError::new(ExErrorKind::Timeout)
                .with_op("pool_acquire")
                .with_message(format!(
                    "no connection available within {}ms (pool size {})",
                    self.acquire_timeout.as_millis(),
                    self.pool.status().max_size
                ))),
            Err(PoolError::Closed) => Err(ExError::new(ExErrorKind::Connection)
                .with_op("pool_acquire")
                .with_message("connection pool is closed")),
            Err(other) => Err(ExError::new(ExErrorKind::Internal)
                .with_op("pool_acquire")
                .with_message(other.to_string())),
        }
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            in_use: status.size.saturating_sub(status.available),
            idle: status.available,
        }
    }

    /// Stop handing out connections and close the idle ones
    pub fn close(&self) {
        self.pool.close();
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("status", &self.status())
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// A checked-out connection that tracks transaction state
///
/// Dropping it hands the connection back to the pool, unless it is broken or
/// a transaction is still open on it.
pub struct PooledConnection {
    conn: Option<Object<ConnectorManager>>,
    dialect: Dialect,
    in_transaction: bool,
    broken: bool,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("dialect", &self.dialect)
            .field("in_transaction", &self.in_transaction)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    fn new(conn: Object<ConnectorManager>) -> Self {
        Self {
            dialect: conn.dialect(),
            conn: Some(conn),
            in_transaction: false,
            broken: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn inner(&mut self) -> Result<&mut Box<dyn Connection>> {
        self.conn.as_deref_mut().ok_or_else(|| {
            ExError::new(ExErrorKind::Internal)
                .with_op("pooled_connection")
                .with_message("connection already closed")
        })
    }

    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.inner()?.execute(sql, params).await
    }

    pub async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.inner()?.query(sql, params).await
    }

    pub async fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        let sql = self.dialect.begin(isolation);
        self.execute(sql, &[]).await?;
        self.in_transaction = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT", &[]).await?;
        self.in_transaction = false;
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK", &[]).await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Close the connection on release instead of reusing it
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.broken || self.in_transaction {
            if let Some(conn) = self.conn.take() {
                drop(Object::take(conn));
            }
        }
    }
}
