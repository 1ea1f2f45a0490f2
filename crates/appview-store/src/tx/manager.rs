//! Transaction manager
//!
//! One unit of work runs on one pooled connection inside one transaction.
//! Deadlocks (including serialization failures surfacing at COMMIT) roll the
//! transaction back and re-run the whole unit after a backoff delay; every
//! other error is returned as is.

use crate::db::ConnectionPool;
use crate::errors::Result;
use crate::sql::validate_identifier;
use crate::tx::session::Session;
use appview_core::config::{IsolationLevel, TransactionOptions};
use appview_core::errors::{ExError, ExErrorKind};
use appview_core::logging_facility::OpLogger;
use appview_core_types::schema::EVENT_RETRY;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[derive(Clone)]
pub struct TransactionManager {
    pool: Arc<ConnectionPool>,
    logger: OpLogger,
}

impl TransactionManager {
    pub fn new(pool: Arc<ConnectionPool>, logger: OpLogger) -> Self {
        Self {
            pool,
            logger: logger.child("transaction_manager"),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Run `unit` inside a transaction, retrying on deadlock
    ///
    /// `unit` may be invoked up to `options.retry.max_attempts` times and
    /// must be safe to re-execute: each invocation starts from a fresh
    /// transaction, and nothing it wrote in a failed attempt survives.
    ///
    /// # Errors
    ///
    /// The unit's own error when it is not a deadlock; a `Deadlock` error
    /// carrying the attempt count when every attempt deadlocked; pool and
    /// BEGIN/COMMIT failures otherwise. A panicking unit is reported as
    /// `Internal`.
    pub async fn run<T, F, Fut>(&self, options: &TransactionOptions, mut unit: F) -> Result<T>
    where
        F: FnMut(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = options.retry.effective_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.run_once(options.isolation, &mut unit).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.kind().is_retryable() {
                return Err(err);
            }

            if attempt >= max_attempts {
                return Err(ExError::new(ExErrorKind::Deadlock)
                    .with_op(err.op().unwrap_or("transaction").to_string())
                    .with_attempts(attempt)
                    .with_message(format!("deadlock persisted after {} attempts", attempt))
                    .with_source(err));
            }

            let delay = options.retry.delay(attempt);
            self.logger.in_scope(|| {
                tracing::warn!(
                    component = self.logger.component(),
                    op = "transaction",
                    event = EVENT_RETRY,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "{}",
                    err
                );
            });
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_once<T, F, Fut>(&self, isolation: IsolationLevel, unit: &mut F) -> Result<T>
    where
        F: FnMut(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Session::new(self.pool.acquire().await?);
        session.begin(isolation).await?;

        let outcome = match AssertUnwindSafe(unit(session.clone())).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ExError::new(ExErrorKind::Internal)
                .with_op("transaction")
                .with_message(format!("unit of work panicked: {}", panic_message(&*panic)))),
        };

        match outcome {
            Ok(value) => match session.commit().await {
                Ok(()) => Ok(value),
                Err(err) => {
                    self.rollback(&session).await;
                    Err(err.with_op("commit"))
                }
            },
            Err(err) => {
                self.rollback(&session).await;
                Err(err)
            }
        }
    }

    /// Roll back; a failed rollback is logged and the connection discarded
    async fn rollback(&self, session: &Session) {
        if let Err(err) = session.rollback().await {
            self.logger.in_scope(|| {
                tracing::warn!(
                    component = self.logger.component(),
                    op = "rollback",
                    err.code = err.code(),
                    "rollback failed, discarding connection: {}",
                    err
                );
            });
            session.mark_broken().await;
        }
    }

    /// Run `f` on a pooled connection in autocommit mode
    ///
    /// For single-statement reads; no retry.
    pub async fn with_connection<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Session::new(self.pool.acquire().await?);
        f(session).await
    }

    /// Run `f` inside a named savepoint of the session's transaction
    ///
    /// On failure the savepoint is rolled back and released and `f`'s error
    /// is returned; the enclosing transaction stays usable and keeps its
    /// earlier writes. Whether that error also fails the enclosing unit is
    /// up to the caller.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a name that is not a plain identifier, `f`'s error,
    /// or the error of a failed savepoint statement. When the savepoint cannot
    /// be undone the enclosing transaction is no longer trustworthy: the error
    /// is `Deadlock` if either failure was one, `Connection` otherwise, and
    /// never a kind a caller would record as a single-row failure.
    pub async fn with_savepoint<T, F, Fut>(&self, session: &Session, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        validate_identifier(name)?;
        session.execute(&format!("SAVEPOINT {}", name), &[]).await?;

        match f(session.clone()).await {
            Ok(value) => {
                session
                    .execute(&format!("RELEASE SAVEPOINT {}", name), &[])
                    .await?;
                Ok(value)
            }
            Err(err) => {
                let undo = async {
                    session
                        .execute(&format!("ROLLBACK TO SAVEPOINT {}", name), &[])
                        .await?;
                    session
                        .execute(&format!("RELEASE SAVEPOINT {}", name), &[])
                        .await
                };
                match undo.await {
                    Ok(_) => Err(err),
                    Err(undo_err) => Err(savepoint_undo_failed(name, err, &undo_err)),
                }
            }
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("pool", &self.pool)
            .finish()
    }
}

/// Error for a savepoint whose rollback failed after `f` failed
fn savepoint_undo_failed(name: &str, err: ExError, undo_err: &ExError) -> ExError {
    let kind = if err.kind().is_retryable() || undo_err.kind().is_retryable() {
        ExErrorKind::Deadlock
    } else {
        ExErrorKind::Connection
    };
    let mut wrapped = ExError::new(kind)
        .with_op("rollback_savepoint")
        .with_message(format!("savepoint {} could not be undone: {}", name, undo_err));
    if let Some(id) = err.entity_id() {
        wrapped = wrapped.with_entity_id(id.to_string());
    }
    wrapped.with_source(err)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
