//! Generic repository over one indexed record kind

use crate::db::SqlValue;
use crate::errors::Result;
use crate::repo::entity::{now_millis, to_millis, uri_from_column, IndexedEntity};
use crate::sql::{SparseUpdate, UpsertStatement};
use crate::tx::TransactionManager;
use appview_core::config::TransactionOptions;
use appview_core::errors::ExError;
use appview_core::logging_facility::OpLogger;
use appview_core::model::{Preprint, RecordUri, Review};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Largest page `list_uris` returns
pub const MAX_PAGE_SIZE: usize = 1000;

/// One page of record keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UriPage {
    pub uris: Vec<RecordUri>,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<String>,
}

pub type PreprintRepository = RecordRepository<Preprint>;
pub type ReviewRepository = RecordRepository<Review>;

/// Idempotent writes and cheap reads for one record kind
///
/// Writes run through the transaction manager, so they retry on deadlock.
/// A key that is not indexed is a normal state: reads return `Ok(None)`,
/// writes that need an existing row return `NotFound`.
pub struct RecordRepository<E: IndexedEntity> {
    tx: TransactionManager,
    options: TransactionOptions,
    logger: OpLogger,
    _entity: PhantomData<fn() -> E>,
}

impl<E: IndexedEntity> Clone for RecordRepository<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            options: self.options.clone(),
            logger: self.logger.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: IndexedEntity> RecordRepository<E> {
    pub fn new(tx: TransactionManager, options: TransactionOptions, logger: OpLogger) -> Self {
        Self {
            tx,
            options,
            logger: logger.child("repository"),
            _entity: PhantomData,
        }
    }

    fn select_columns() -> String {
        E::COLUMNS.join(", ")
    }

    fn key_param(uri: &RecordUri) -> SqlValue {
        SqlValue::from(uri.as_str())
    }

    /// Insert or fully replace the row for `entity`'s key
    ///
    /// Every mutable column is overwritten (no field-level merge) and
    /// `indexed_at` advances to `max(now, previous + 1ms)`. Storing the same
    /// entity again is harmless.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the entity fails validation (nothing is written),
    /// otherwise the classified database error.
    pub async fn store(&self, entity: &E) -> Result<()> {
        self.logger
            .instrument("store", self.store_inner(entity))
            .await
            .map_err(|e| e.with_entity_id(entity.key().as_str()))
    }

    async fn store_inner(&self, entity: &E) -> Result<()> {
        entity.validate()?;
        let values = Arc::new(entity.to_row(now_millis())?);
        let statement = UpsertStatement::new(E::TABLE, E::COLUMNS, E::KEY_COLUMN);

        self.tx
            .run(&self.options, |session| {
                let values = values.clone();
                async move {
                    let sql = statement.render(session.dialect(), 1);
                    session.execute(&sql, &values).await
                }
            })
            .await?;
        Ok(())
    }

    /// Store `entity` and record where and when it was fetched, atomically
    ///
    /// # Errors
    ///
    /// As for `store`.
    pub async fn store_with_provenance(
        &self,
        entity: &E,
        origin_url: &str,
        last_synced: DateTime<Utc>,
    ) -> Result<()> {
        self.logger
            .instrument(
                "store_with_provenance",
                self.store_with_provenance_inner(entity, origin_url, last_synced),
            )
            .await
            .map_err(|e| e.with_entity_id(entity.key().as_str()))
    }

    async fn store_with_provenance_inner(
        &self,
        entity: &E,
        origin_url: &str,
        last_synced: DateTime<Utc>,
    ) -> Result<()> {
        entity.validate()?;
        let values = Arc::new(entity.to_row(now_millis())?);
        let provenance = Arc::new(vec![
            SqlValue::from(origin_url),
            SqlValue::Integer(to_millis(&last_synced)),
            Self::key_param(entity.key()),
        ]);
        let statement = UpsertStatement::new(E::TABLE, E::COLUMNS, E::KEY_COLUMN);

        self.tx
            .run(&self.options, |session| {
                let values = values.clone();
                let provenance = provenance.clone();
                async move {
                    let dialect = session.dialect();
                    session
                        .execute(&statement.render(dialect, 1), &values)
                        .await?;
                    let sql = format!(
                        "UPDATE {} SET origin_url = {}, last_synced_at = {} WHERE {} = {}",
                        E::TABLE,
                        dialect.placeholder(1),
                        dialect.placeholder(2),
                        E::KEY_COLUMN,
                        dialect.placeholder(3)
                    );
                    session.execute(&sql, &provenance).await
                }
            })
            .await?;
        Ok(())
    }

    /// Point lookup; `Ok(None)` when the key is not indexed
    ///
    /// # Errors
    ///
    /// Database failures, or `Serialization` when the stored row cannot be
    /// decoded.
    pub async fn find_by_uri(&self, uri: &RecordUri) -> Result<Option<E>> {
        let sql_for = |dialect: crate::db::Dialect| {
            format!(
                "SELECT {} FROM {} WHERE {} = {}",
                Self::select_columns(),
                E::TABLE,
                E::KEY_COLUMN,
                dialect.placeholder(1)
            )
        };
        let find = self.tx.with_connection(|session| async move {
            let row = session
                .query_optional(&sql_for(session.dialect()), &[Self::key_param(uri)])
                .await?;
            row.map(|row| E::from_row(&row)).transpose()
        });

        self.logger
            .instrument("find_by_uri", find)
            .await
            .map_err(|e| e.with_entity_id(uri.as_str()))
    }

    /// Sparse update of the columns a patch sets; refreshes `indexed_at`
    ///
    /// # Errors
    ///
    /// `NotFound` when no row has the key; `InvalidInput` for an empty or
    /// invalid patch.
    pub async fn update(&self, uri: &RecordUri, patch: &E::Patch) -> Result<()> {
        self.logger
            .instrument("update", self.update_inner(uri, patch))
            .await
            .map_err(|e| e.with_entity_id(uri.as_str()))
    }

    async fn update_inner(&self, uri: &RecordUri, patch: &E::Patch) -> Result<()> {
        let assignments = E::patch_columns(uri, patch)?;
        let columns: Vec<&'static str> = assignments.iter().map(|(c, _)| *c).collect();
        let mut params: Vec<SqlValue> = assignments.into_iter().map(|(_, v)| v).collect();
        params.push(SqlValue::Integer(now_millis()));
        params.push(Self::key_param(uri));
        let params = Arc::new(params);
        let statement = SparseUpdate::new(E::TABLE, E::KEY_COLUMN, columns);

        let updated = self
            .tx
            .run(&self.options, |session| {
                let params = params.clone();
                let sql = statement.render(session.dialect());
                async move { session.execute(&sql, &params).await }
            })
            .await?;

        if updated == 0 {
            return Err(ExError::not_found("update", uri.as_str()));
        }
        Ok(())
    }

    /// Remove the local row; the authoritative record is untouched
    ///
    /// # Errors
    ///
    /// `NotFound` when no row has the key. Callers replaying deletes may
    /// treat that as success.
    pub async fn delete(&self, uri: &RecordUri) -> Result<()> {
        self.logger
            .instrument("delete", self.delete_inner(uri))
            .await
            .map_err(|e| e.with_entity_id(uri.as_str()))
    }

    async fn delete_inner(&self, uri: &RecordUri) -> Result<()> {
        let key = Arc::new(vec![Self::key_param(uri)]);
        let deleted = self
            .tx
            .run(&self.options, |session| {
                let key = key.clone();
                let sql = format!(
                    "DELETE FROM {} WHERE {} = {}",
                    E::TABLE,
                    E::KEY_COLUMN,
                    session.dialect().placeholder(1)
                );
                async move { session.execute(&sql, &key).await }
            })
            .await?;

        if deleted == 0 {
            return Err(ExError::not_found("delete", uri.as_str()));
        }
        Ok(())
    }

    /// Number of indexed records of this kind
    pub async fn count(&self) -> Result<u64> {
        let count = self.tx.with_connection(|session| async move {
            let n = session
                .query_scalar_i64(&format!("SELECT COUNT(*) FROM {}", E::TABLE), &[])
                .await?;
            Ok(u64::try_from(n).unwrap_or_default())
        });
        self.logger.instrument("count", count).await
    }

    /// Keys in key order, one page at a time
    ///
    /// The cursor is the decimal row offset of the next page. Offset paging
    /// rescans skipped rows, so deep pages get slower as the table grows.
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a cursor that is not a decimal offset.
    pub async fn list_uris(&self, cursor: Option<&str>, limit: usize) -> Result<UriPage> {
        let offset = match cursor {
            Some(cursor) => cursor.parse::<u64>().map_err(|_| {
                ExError::invalid_input("list_uris", format!("malformed cursor: {:?}", cursor))
            })?,
            None => 0,
        };
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let list = self.tx.with_connection(|session| async move {
            let dialect = session.dialect();
            let sql = format!(
                "SELECT {key} FROM {table} ORDER BY {key} LIMIT {} OFFSET {}",
                dialect.placeholder(1),
                dialect.placeholder(2),
                key = E::KEY_COLUMN,
                table = E::TABLE
            );
            // One extra row tells whether another page exists.
            let rows = session
                .query(
                    &sql,
                    &[
                        SqlValue::Integer(limit as i64 + 1),
                        SqlValue::Integer(i64::try_from(offset).unwrap_or(i64::MAX)),
                    ],
                )
                .await?;

            let has_more = rows.len() > limit;
            let uris = rows
                .iter()
                .take(limit)
                .map(|row| uri_from_column(E::TABLE, E::KEY_COLUMN, row.text(E::KEY_COLUMN)?))
                .collect::<Result<Vec<_>>>()?;
            let next_cursor = has_more.then(|| (offset + limit as u64).to_string());

            Ok(UriPage { uris, next_cursor })
        });

        self.logger.instrument("list_uris", list).await
    }

    /// Keys not synced since `older_than` (or never), oldest first
    ///
    /// Used to schedule resyncs against the source of truth.
    pub async fn find_stale(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RecordUri>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let threshold = to_millis(&older_than);

        let find = self.tx.with_connection(|session| async move {
            let dialect = session.dialect();
            let sql = format!(
                "SELECT {key} FROM {table} \
                 WHERE last_synced_at IS NULL OR last_synced_at < {} \
                 ORDER BY COALESCE(last_synced_at, 0), {key} LIMIT {}",
                dialect.placeholder(1),
                dialect.placeholder(2),
                key = E::KEY_COLUMN,
                table = E::TABLE
            );
            let rows = session
                .query(
                    &sql,
                    &[SqlValue::Integer(threshold), SqlValue::Integer(limit as i64)],
                )
                .await?;
            rows.iter()
                .map(|row| uri_from_column(E::TABLE, E::KEY_COLUMN, row.text(E::KEY_COLUMN)?))
                .collect()
        });

        self.logger.instrument("find_stale", find).await
    }
}

impl RecordRepository<Review> {
    /// Review keys for a preprint, oldest first
    pub async fn list_for_subject(&self, subject_uri: &RecordUri) -> Result<Vec<RecordUri>> {
        let list = self.tx.with_connection(|session| async move {
            let sql = format!(
                "SELECT uri FROM reviews WHERE subject_uri = {} ORDER BY created_at, uri",
                session.dialect().placeholder(1)
            );
            let rows = session
                .query(&sql, &[SqlValue::from(subject_uri.as_str())])
                .await?;
            rows.iter()
                .map(|row| uri_from_column("reviews", "uri", row.text("uri")?))
                .collect()
        });

        self.logger
            .instrument("list_for_subject", list)
            .await
            .map_err(|e| e.with_entity_id(subject_uri.as_str()))
    }
}

impl<E: IndexedEntity> std::fmt::Debug for RecordRepository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordRepository")
            .field("table", &E::TABLE)
            .field("options", &self.options)
            .finish()
    }
}
