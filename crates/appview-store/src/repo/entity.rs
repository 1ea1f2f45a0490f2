//! Row mapping contract for indexed record kinds

use crate::db::{Row, SqlValue};
use crate::errors::{decode_error, encode_error, Result};
use appview_core::model::RecordUri;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// How a record kind is stored
///
/// `COLUMNS` is the full ordered column list; `to_row` produces exactly one
/// value per column in that order and `from_row` reverses every step of it
/// (flattened references are rebuilt, serialized sub-objects parsed).
pub trait IndexedEntity: Clone + Send + Sync + 'static {
    /// Short name used in logs and CLI output
    const KIND: &'static str;
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str = "uri";
    const COLUMNS: &'static [&'static str];
    /// Columns `batch_update_field` may target
    const UPDATABLE_COLUMNS: &'static [&'static str];

    /// Typed sparse update for this kind
    type Patch: Send + Sync;

    fn key(&self) -> &RecordUri;

    /// Reject the record before it reaches the database
    fn validate(&self) -> Result<()>;

    fn to_row(&self, indexed_at: i64) -> Result<Vec<SqlValue>>;

    fn from_row(row: &Row) -> Result<Self>;

    /// Column assignments for a patch, validated
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty or invalid patch.
    fn patch_columns(key: &RecordUri, patch: &Self::Patch) -> Result<Vec<(&'static str, SqlValue)>>;
}

/// Current time in the store's timestamp unit
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(table: &str, column: &str, millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| decode_error(table, column, format!("timestamp out of range: {}", millis)))
}

pub fn opt_from_millis(
    table: &str,
    column: &str,
    millis: Option<i64>,
) -> Result<Option<DateTime<Utc>>> {
    millis.map(|m| from_millis(table, column, m)).transpose()
}

pub fn to_json<T: Serialize + ?Sized>(column: &str, value: &T) -> Result<SqlValue> {
    serde_json::to_string(value)
        .map(SqlValue::Text)
        .map_err(|e| encode_error(column, e))
}

/// JSON text, or NULL for an empty list
pub fn to_json_or_null<T: Serialize>(column: &str, values: &[T]) -> Result<SqlValue> {
    if values.is_empty() {
        Ok(SqlValue::Null)
    } else {
        to_json(column, values)
    }
}

pub fn from_json<T: DeserializeOwned>(table: &str, column: &str, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| decode_error(table, column, e))
}

/// Parse a nullable JSON list column; NULL reads back as empty
pub fn list_from_json<T: DeserializeOwned>(
    table: &str,
    column: &str,
    text: Option<String>,
) -> Result<Vec<T>> {
    match text {
        Some(text) => from_json(table, column, &text),
        None => Ok(Vec::new()),
    }
}

pub fn uri_from_column(table: &str, column: &str, text: String) -> Result<RecordUri> {
    RecordUri::parse(text).map_err(|e| decode_error(table, column, e))
}
