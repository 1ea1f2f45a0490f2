//! SQL statement builder
//!
//! Renders `{table, columns, conflict key}` descriptions into parameterized
//! statements for a `Dialect`. Table and column names always come from
//! entity constants, never from input; savepoint names are validated with
//! `validate_identifier` because callers choose them.

use crate::db::Dialect;
use crate::errors::Result;
use appview_core::errors::ExError;

/// Column stamped on every write, strictly increasing per key
pub const INDEXED_AT: &str = "indexed_at";

/// Reject anything that is not a plain SQL identifier
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ExError::invalid_input(
            "validate_identifier",
            format!("not a valid SQL identifier: {:?}", name),
        ))
    }
}

/// `CASE` expression advancing `indexed_at` to `max(new, old + 1)`
fn advance_indexed_at(table: &str, new_value: &str) -> String {
    format!(
        "CASE WHEN {new} > {t}.{c} THEN {new} ELSE {t}.{c} + 1 END",
        new = new_value,
        t = table,
        c = INDEXED_AT
    )
}

fn placeholders(dialect: Dialect, first: usize, count: usize) -> String {
    (first..first + count)
        .map(|n| dialect.placeholder(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Multi-row `INSERT ... ON CONFLICT (key) DO UPDATE`
///
/// Every column except the key is replaced from `excluded`; `indexed_at`
/// only ever moves forward.
#[derive(Debug, Clone, Copy)]
pub struct UpsertStatement<'a> {
    table: &'a str,
    columns: &'a [&'a str],
    conflict_key: &'a str,
}

impl<'a> UpsertStatement<'a> {
    pub fn new(table: &'a str, columns: &'a [&'a str], conflict_key: &'a str) -> Self {
        Self {
            table,
            columns,
            conflict_key,
        }
    }

    pub fn params_per_row(&self) -> usize {
        self.columns.len()
    }

    /// Rows that fit in one statement under the dialect's parameter limit
    pub fn max_rows(&self, dialect: Dialect) -> usize {
        (dialect.max_params() / self.params_per_row().max(1)).max(1)
    }

    /// Render a statement for `rows` rows of parameters
    pub fn render(&self, dialect: Dialect, rows: usize) -> String {
        let width = self.columns.len();
        let values = (0..rows)
            .map(|r| format!("({})", placeholders(dialect, r * width + 1, width)))
            .collect::<Vec<_>>()
            .join(", ");

        let assignments = self
            .columns
            .iter()
            .filter(|c| **c != self.conflict_key)
            .map(|c| {
                if *c == INDEXED_AT {
                    format!(
                        "{} = {}",
                        c,
                        advance_indexed_at(self.table, &format!("excluded.{}", INDEXED_AT))
                    )
                } else {
                    format!("{c} = excluded.{c}", c = c)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
            self.table,
            self.columns.join(", "),
            values,
            self.conflict_key,
            assignments
        )
    }
}

/// `UPDATE` of a chosen subset of columns on one key
///
/// Parameters: one per assigned column, then the new `indexed_at`, then the
/// key.
#[derive(Debug, Clone)]
pub struct SparseUpdate<'a> {
    table: &'a str,
    key_column: &'a str,
    columns: Vec<&'a str>,
}

impl<'a> SparseUpdate<'a> {
    pub fn new(table: &'a str, key_column: &'a str, columns: Vec<&'a str>) -> Self {
        Self {
            table,
            key_column,
            columns,
        }
    }

    pub fn render(&self, dialect: Dialect) -> String {
        let mut assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", c, dialect.placeholder(i + 1)))
            .collect();
        let stamp = dialect.placeholder(self.columns.len() + 1);
        assignments.push(format!(
            "{} = {}",
            INDEXED_AT,
            advance_indexed_at(self.table, &stamp)
        ));

        format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.table,
            assignments.join(", "),
            self.key_column,
            dialect.placeholder(self.columns.len() + 2)
        )
    }
}

/// One column updated across many keys in a single statement
///
/// `UPDATE t SET col = CASE key WHEN k1 THEN v1 .. END WHERE key IN (..)
/// RETURNING key`. Parameters alternate key, value per row, followed by the
/// new `indexed_at`; the key placeholders are reused in the `IN` list.
#[derive(Debug, Clone, Copy)]
pub struct BatchUpdateStatement<'a> {
    table: &'a str,
    key_column: &'a str,
    column: &'a str,
}

impl<'a> BatchUpdateStatement<'a> {
    pub fn new(table: &'a str, key_column: &'a str, column: &'a str) -> Self {
        Self {
            table,
            key_column,
            column,
        }
    }

    pub fn max_rows(&self, dialect: Dialect) -> usize {
        ((dialect.max_params() - 1) / 2).max(1)
    }

    pub fn render(&self, dialect: Dialect, rows: usize) -> String {
        let arms = (0..rows)
            .map(|r| {
                format!(
                    "WHEN {} THEN {}",
                    dialect.placeholder(2 * r + 1),
                    dialect.placeholder(2 * r + 2)
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let keys = (0..rows)
            .map(|r| dialect.placeholder(2 * r + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let stamp = dialect.placeholder(2 * rows + 1);

        format!(
            "UPDATE {t} SET {col} = CASE {key} {arms} END, {ia} = {advance} WHERE {key} IN ({keys}) RETURNING {key}",
            t = self.table,
            col = self.column,
            key = self.key_column,
            arms = arms,
            ia = INDEXED_AT,
            advance = advance_indexed_at(self.table, &stamp),
            keys = keys
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[&str] = &["uri", "cid", "title", "indexed_at"];

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("batch_row").is_ok());
        assert!(validate_identifier("_sp1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("sp; DROP TABLE preprints").is_err());
    }

    #[test]
    fn test_single_row_upsert_sqlite() {
        let sql = UpsertStatement::new("preprints", COLUMNS, "uri").render(Dialect::Sqlite, 1);
        assert_eq!(
            sql,
            "INSERT INTO preprints (uri, cid, title, indexed_at) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (uri) DO UPDATE SET cid = excluded.cid, title = excluded.title, \
             indexed_at = CASE WHEN excluded.indexed_at > preprints.indexed_at \
             THEN excluded.indexed_at ELSE preprints.indexed_at + 1 END"
        );
    }

    #[test]
    fn test_multi_row_upsert_postgres_numbering() {
        let sql = UpsertStatement::new("preprints", COLUMNS, "uri").render(Dialect::Postgres, 2);
        assert!(sql.contains("VALUES ($1, $2, $3, $4), ($5, $6, $7, $8) ON CONFLICT (uri)"));
    }

    #[test]
    fn test_key_column_never_reassigned() {
        let sql = UpsertStatement::new("preprints", COLUMNS, "uri").render(Dialect::Sqlite, 1);
        assert!(!sql.contains("uri = excluded.uri"));
    }

    #[test]
    fn test_sparse_update() {
        let sql = SparseUpdate::new("reviews", "uri", vec!["body", "motivation"])
            .render(Dialect::Sqlite);
        assert_eq!(
            sql,
            "UPDATE reviews SET body = ?1, motivation = ?2, \
             indexed_at = CASE WHEN ?3 > reviews.indexed_at THEN ?3 ELSE reviews.indexed_at + 1 END \
             WHERE uri = ?4"
        );
    }

    #[test]
    fn test_batch_update() {
        let sql = BatchUpdateStatement::new("preprints", "uri", "doi").render(Dialect::Sqlite, 2);
        assert_eq!(
            sql,
            "UPDATE preprints SET doi = CASE uri WHEN ?1 THEN ?2 WHEN ?3 THEN ?4 END, \
             indexed_at = CASE WHEN ?5 > preprints.indexed_at THEN ?5 ELSE preprints.indexed_at + 1 END \
             WHERE uri IN (?1, ?3) RETURNING uri"
        );
    }

    #[test]
    fn test_row_limits() {
        let upsert = UpsertStatement::new("preprints", COLUMNS, "uri");
        assert_eq!(upsert.max_rows(Dialect::Sqlite), 32_766 / 4);
        let update = BatchUpdateStatement::new("preprints", "uri", "doi");
        assert_eq!(update.max_rows(Dialect::Sqlite), 16_382);
    }
}
