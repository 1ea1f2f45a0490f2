//! SQLite backend
//!
//! rusqlite is synchronous and a statement may wait out the busy timeout
//! on a locked database. On a multi-threaded runtime statements run under
//! `block_in_place` so the worker's other tasks move elsewhere while one
//! waits; a current-thread runtime has no other worker and runs them inline.

use crate::db::connection::{Connection, Connector, Dialect};
use crate::db::value::{Row, SqlValue};
use crate::errors::{from_rusqlite, Result};
use crate::migrations::{applied_migrations, apply_migrations};
use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::OpenFlags;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            SqlValue::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Integer(v),
            ValueRef::Real(v) => SqlValue::Real(v),
            ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
        }
    }
}

/// A rusqlite connection behind the async `Connection` trait
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    fn execute_sync(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(from_rusqlite)?;
        let changed = stmt
            .execute(rusqlite::params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        Ok(changed as u64)
    }

    fn query_sync(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(from_rusqlite)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = names.len();
        let columns: Arc<[String]> = Arc::from(names);

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(from_rusqlite)? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(SqlValue::from(row.get_ref(i).map_err(from_rusqlite)?));
            }
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        off_worker(|| self.execute_sync(sql, params))
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        off_worker(|| self.query_sync(sql, params))
    }
}

fn off_worker<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    /// Shared-cache in-memory database, addressed by URI
    Memory(String),
}

/// Opens SQLite connections to one database
///
/// Migrations run once, when the connector is created.
#[derive(Debug)]
pub struct SqliteConnector {
    target: Target,
    busy_timeout: Duration,
    // A shared in-memory database lives only while a connection is open.
    _anchor: Option<Mutex<rusqlite::Connection>>,
}

impl SqliteConnector {
    /// File-backed database, created if missing
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let connector = Self {
            target: Target::File(path.as_ref().to_path_buf()),
            busy_timeout,
            _anchor: None,
        };
        let mut conn = connector.open_raw()?;
        apply_migrations(&mut conn)?;
        Ok(connector)
    }

    /// Private in-memory database shared by every connection of this connector
    pub fn in_memory(busy_timeout: Duration) -> Result<Self> {
        let uri = format!(
            "file:appview-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        );
        let mut connector = Self {
            target: Target::Memory(uri),
            busy_timeout,
            _anchor: None,
        };
        let mut anchor = connector.open_raw()?;
        apply_migrations(&mut anchor)?;
        connector._anchor = Some(Mutex::new(anchor));
        Ok(connector)
    }

    /// Ids of the migrations recorded in the database
    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        let conn = self.open_raw()?;
        applied_migrations(&conn)
    }

    /// Open and configure a plain rusqlite connection
    pub fn open_raw(&self) -> Result<rusqlite::Connection> {
        let conn = match &self.target {
            Target::File(path) => rusqlite::Connection::open(path).map_err(from_rusqlite)?,
            Target::Memory(uri) => rusqlite::Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .map_err(from_rusqlite)?,
        };
        configure(&conn, &self.target, self.busy_timeout)?;
        Ok(conn)
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::new(self.open_raw()?)))
    }
}

fn configure(conn: &rusqlite::Connection, target: &Target, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout).map_err(from_rusqlite)?;

    if let Target::File(_) = target {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(from_rusqlite)?;
    }

    Ok(())
}
