//! Chunked batch writes with per-item failure tracking
//!
//! Two modes, picked by `BatchConfig::continue_on_error`:
//!
//! - fast path (`false`): one multi-row statement per chunk; the first bad
//!   row aborts the chunk and the batch, later chunks are never attempted
//! - slow path (`true`): rows are written one at a time, each inside a
//!   savepoint, so a bad row is recorded and the chunk carries on
//!
//! Both modes go through `run_chunks`, which owns chunking, the
//! transaction-manager retry and failure attribution.

use crate::batch::chunking::{chunk_ranges, ChunkRange};
use crate::batch::FieldUpdate;
use crate::db::SqlValue;
use crate::errors::Result;
use crate::repo::entity::{now_millis, IndexedEntity};
use crate::sql::{BatchUpdateStatement, SparseUpdate, UpsertStatement};
use crate::tx::{Session, TransactionManager};
use appview_core::config::BatchConfig;
use appview_core::errors::{ExError, ExErrorKind};
use appview_core::logging_facility::{elapsed_ms, OpLogger};
use appview_core::model::{BatchFailure, BatchOutcome};
use appview_core_types::schema::EVENT_PROGRESS;
use appview_core_types::BatchId;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

const ROW_SAVEPOINT: &str = "batch_row";

/// A validated, translated item ready for the database
struct PreparedRow {
    index: usize,
    key: String,
    values: Vec<SqlValue>,
}

/// Per-row failures of one chunk, by input ordinal
type RowFailures = Vec<(usize, ExError)>;

/// Errors a single row can cause without condemning its chunk
fn is_row_level(kind: ExErrorKind) -> bool {
    matches!(
        kind,
        ExErrorKind::ConstraintViolation
            | ExErrorKind::InvalidInput
            | ExErrorKind::Serialization
            | ExErrorKind::NotFound
    )
}

fn chunk_error(op: &str, chunk_index: usize, err: ExError) -> ExError {
    let mut wrapped = ExError::new(err.kind())
        .with_op(op)
        .with_chunk_index(chunk_index)
        .with_message(format!("chunk {} failed: {}", chunk_index, err.message()));
    if let Some(attempts) = err.attempts() {
        wrapped = wrapped.with_attempts(attempts);
    }
    if let Some(id) = err.entity_id() {
        wrapped = wrapped.with_entity_id(id.to_string());
    }
    wrapped.with_source(err)
}

#[derive(Clone)]
pub struct BatchEngine {
    tx: TransactionManager,
    logger: OpLogger,
}

impl BatchEngine {
    pub fn new(tx: TransactionManager, logger: OpLogger) -> Self {
        Self {
            tx,
            logger: logger.child("batch_engine"),
        }
    }

    /// Upsert `items` chunk by chunk
    ///
    /// `on_progress(processed, total)` fires after every chunk. Failure
    /// indices refer to positions in `items`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a zero chunk size. In fail-fast mode, the error of
    /// the first failing chunk, tagged with its chunk index; no later chunk
    /// is attempted.
    pub async fn batch_upsert<E: IndexedEntity>(
        &self,
        items: &[E],
        config: &BatchConfig,
        on_progress: impl FnMut(usize, usize),
    ) -> Result<BatchOutcome<E>> {
        let prepare = |item: &E| -> Result<(String, Vec<SqlValue>)> {
            item.validate()?;
            Ok((item.key().to_string(), item.to_row(now_millis())?))
        };

        if config.continue_on_error {
            let tx = self.tx.clone();
            self.run_chunks(
                "batch_upsert",
                items,
                config,
                on_progress,
                prepare,
                move |session, rows| upsert_rows::<E>(tx.clone(), session, rows),
            )
            .await
        } else {
            self.run_chunks(
                "batch_upsert",
                items,
                config,
                on_progress,
                prepare,
                upsert_chunk::<E>,
            )
            .await
        }
    }

    /// Set one column on many records
    ///
    /// `column` must be one of the kind's updatable columns. A key that
    /// matches no row is recorded as a `NotFound` failure in both modes.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a column that may not be batch-updated or a zero
    /// chunk size; otherwise as for `batch_upsert`.
    pub async fn batch_update_field<E: IndexedEntity>(
        &self,
        column: &str,
        updates: &[FieldUpdate],
        config: &BatchConfig,
        on_progress: impl FnMut(usize, usize),
    ) -> Result<BatchOutcome<FieldUpdate>> {
        let column: &'static str = E::UPDATABLE_COLUMNS
            .iter()
            .copied()
            .find(|c| *c == column)
            .ok_or_else(|| {
                ExError::invalid_input(
                    "batch_update_field",
                    format!("{}.{} cannot be batch-updated", E::TABLE, column),
                )
            })?;

        let prepare = |update: &FieldUpdate| -> Result<(String, Vec<SqlValue>)> {
            Ok((update.key.to_string(), vec![update.value.clone()]))
        };

        if config.continue_on_error {
            let tx = self.tx.clone();
            self.run_chunks(
                "batch_update_field",
                updates,
                config,
                on_progress,
                prepare,
                move |session, rows| update_rows::<E>(tx.clone(), column, session, rows),
            )
            .await
        } else {
            self.run_chunks(
                "batch_update_field",
                updates,
                config,
                on_progress,
                prepare,
                move |session, rows| update_chunk::<E>(column, session, rows),
            )
            .await
        }
    }

    async fn run_chunks<T, Prep, Apply, Fut>(
        &self,
        op: &'static str,
        items: &[T],
        config: &BatchConfig,
        mut on_progress: impl FnMut(usize, usize),
        mut prepare: Prep,
        mut apply: Apply,
    ) -> Result<BatchOutcome<T>>
    where
        T: Clone,
        Prep: FnMut(&T) -> Result<(String, Vec<SqlValue>)>,
        Apply: FnMut(Session, Arc<Vec<PreparedRow>>) -> Fut,
        Fut: Future<Output = Result<RowFailures>>,
    {
        if config.chunk_size == 0 {
            return Err(ExError::invalid_input(
                op,
                "chunk_size must be greater than zero",
            ));
        }

        let started = Instant::now();
        let batch_id = BatchId::new();
        let total = items.len();
        let mut outcome = BatchOutcome::empty(total);

        self.logger.op_start(op);

        for chunk in chunk_ranges(total, config.chunk_size) {
            let slice = &items[chunk.start..chunk.end];
            let failures = match self
                .run_chunk(op, chunk, slice, config, &mut prepare, &mut apply)
                .await
            {
                Ok(failures) => failures,
                Err(err) => {
                    self.logger.op_error(op, &err, elapsed_ms(started));
                    return Err(err);
                }
            };

            outcome.record_successes(chunk.len() - failures.len());
            for (index, error) in failures {
                outcome.record_failure(BatchFailure {
                    item: items[index].clone(),
                    error,
                    index,
                });
            }

            self.logger.in_scope(|| {
                tracing::debug!(
                    component = self.logger.component(),
                    op = op,
                    event = EVENT_PROGRESS,
                    batch_id = batch_id.as_str(),
                    chunk_index = chunk.index,
                    processed = outcome.processed(),
                    failed = outcome.failure_count,
                    total = total,
                );
            });
            on_progress(outcome.processed(), total);
        }

        outcome.duration_ms = elapsed_ms(started);
        self.logger.op_end(op, outcome.duration_ms);
        Ok(outcome)
    }

    /// Prepare and write one chunk; returns its failures sorted by ordinal
    async fn run_chunk<T, Prep, Apply, Fut>(
        &self,
        op: &'static str,
        chunk: ChunkRange,
        slice: &[T],
        config: &BatchConfig,
        prepare: &mut Prep,
        apply: &mut Apply,
    ) -> Result<RowFailures>
    where
        Prep: FnMut(&T) -> Result<(String, Vec<SqlValue>)>,
        Apply: FnMut(Session, Arc<Vec<PreparedRow>>) -> Fut,
        Fut: Future<Output = Result<RowFailures>>,
    {
        let mut failures = Vec::new();
        let mut rows = Vec::with_capacity(slice.len());

        for (position, item) in slice.iter().enumerate() {
            let index = chunk.ordinal(position);
            match prepare(item) {
                Ok((key, values)) => rows.push(PreparedRow { index, key, values }),
                Err(err) if config.continue_on_error => failures.push((index, err)),
                Err(err) => return Err(chunk_error(op, chunk.index, err)),
            }
        }

        if !rows.is_empty() {
            let rows = Arc::new(rows);
            // Row failures of an abandoned attempt are dropped with it; only
            // the attempt that commits reports any.
            let written = self
                .tx
                .run(&config.transaction, |session| apply(session, rows.clone()))
                .await;

            match written {
                Ok(row_failures) => failures.extend(row_failures),
                Err(err) if config.continue_on_error => {
                    let err = chunk_error(op, chunk.index, err);
                    self.logger.in_scope(|| {
                        tracing::warn!(
                            component = self.logger.component(),
                            op = op,
                            chunk_index = chunk.index,
                            err.code = err.code(),
                            "chunk failed, recording all {} rows: {}",
                            rows.len(),
                            err
                        );
                    });
                    failures.extend(
                        rows.iter()
                            .map(|row| (row.index, err.clone().with_entity_id(row.key.as_str()))),
                    );
                }
                Err(err) => return Err(chunk_error(op, chunk.index, err)),
            }
        }

        failures.sort_by_key(|(index, _)| *index);
        Ok(failures)
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine").finish_non_exhaustive()
    }
}

/// Keep a row-level failure, propagate anything that must fail the chunk
fn record_row_failure(failures: &mut RowFailures, row: &PreparedRow, err: ExError) -> Result<()> {
    if is_row_level(err.kind()) {
        failures.push((row.index, err.with_entity_id(row.key.as_str())));
        Ok(())
    } else {
        Err(err)
    }
}

async fn upsert_chunk<E: IndexedEntity>(
    session: Session,
    rows: Arc<Vec<PreparedRow>>,
) -> Result<RowFailures> {
    let statement = UpsertStatement::new(E::TABLE, E::COLUMNS, E::KEY_COLUMN);
    let dialect = session.dialect();

    for group in rows.chunks(statement.max_rows(dialect)) {
        let params: Vec<SqlValue> = group
            .iter()
            .flat_map(|row| row.values.iter().cloned())
            .collect();
        session
            .execute(&statement.render(dialect, group.len()), &params)
            .await?;
    }
    Ok(Vec::new())
}

async fn upsert_rows<E: IndexedEntity>(
    tx: TransactionManager,
    session: Session,
    rows: Arc<Vec<PreparedRow>>,
) -> Result<RowFailures> {
    let sql =
        UpsertStatement::new(E::TABLE, E::COLUMNS, E::KEY_COLUMN).render(session.dialect(), 1);
    let sql = sql.as_str();
    let mut failures = Vec::new();

    for row in rows.iter() {
        let written = tx
            .with_savepoint(&session, ROW_SAVEPOINT, |s| async move {
                s.execute(sql, &row.values).await
            })
            .await;
        if let Err(err) = written {
            record_row_failure(&mut failures, row, err)?;
        }
    }
    Ok(failures)
}

async fn update_chunk<E: IndexedEntity>(
    column: &'static str,
    session: Session,
    rows: Arc<Vec<PreparedRow>>,
) -> Result<RowFailures> {
    let statement = BatchUpdateStatement::new(E::TABLE, E::KEY_COLUMN, column);
    let dialect = session.dialect();
    let stamp = now_millis();
    let mut failures = Vec::new();

    for group in rows.chunks(statement.max_rows(dialect)) {
        let mut params = Vec::with_capacity(group.len() * 2 + 1);
        for row in group {
            params.push(SqlValue::from(row.key.as_str()));
            params.extend(row.values.iter().cloned());
        }
        params.push(SqlValue::Integer(stamp));

        let returned = session
            .query(&statement.render(dialect, group.len()), &params)
            .await?;
        let matched = returned
            .iter()
            .map(|r| r.text(E::KEY_COLUMN))
            .collect::<Result<HashSet<String>>>()?;

        for row in group.iter().filter(|row| !matched.contains(&row.key)) {
            failures.push((
                row.index,
                ExError::not_found("batch_update_field", row.key.as_str()),
            ));
        }
    }
    Ok(failures)
}

async fn update_rows<E: IndexedEntity>(
    tx: TransactionManager,
    column: &'static str,
    session: Session,
    rows: Arc<Vec<PreparedRow>>,
) -> Result<RowFailures> {
    let sql = SparseUpdate::new(E::TABLE, E::KEY_COLUMN, vec![column]).render(session.dialect());
    let sql = sql.as_str();
    let stamp = now_millis();
    let mut failures = Vec::new();

    for row in rows.iter() {
        let mut params = row.values.clone();
        params.push(SqlValue::Integer(stamp));
        params.push(SqlValue::from(row.key.as_str()));

        let updated = tx
            .with_savepoint(&session, ROW_SAVEPOINT, |s| async move {
                match s.execute(sql, &params).await? {
                    0 => Err(ExError::not_found("batch_update_field", row.key.as_str())),
                    _ => Ok(()),
                }
            })
            .await;
        if let Err(err) = updated {
            record_row_failure(&mut failures, row, err)?;
        }
    }
    Ok(failures)
}
