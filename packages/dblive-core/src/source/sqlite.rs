//! SQLite row source backed by rusqlite.

use std::fmt::Write as _;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::change::{Row, RowId, Value};
use crate::error::{MonitorError, Result};

use super::RowSource;

/// Maps a rusqlite error to a `MonitorError`.
fn source_err(e: rusqlite::Error) -> MonitorError {
    MonitorError::SourceAccess(e.to_string())
}

/// Quotes an identifier for interpolation into SQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite-backed row source.
///
/// Rows are keyed by rowid, so `WITHOUT ROWID` tables are not supported.
pub struct SqliteSource {
    conn: Connection,
    identifier: String,
}

impl SqliteSource {
    /// Opens a file-backed SQLite database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let identifier = path.as_ref().display().to_string();
        let conn = Connection::open(path.as_ref()).map_err(source_err)?;
        Ok(Self { conn, identifier })
    }

    /// Opens a private in-memory SQLite database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(source_err)?;
        Ok(Self {
            conn,
            identifier: ":memory:".to_string(),
        })
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection, identifier: impl Into<String>) -> Self {
        Self {
            conn,
            identifier: identifier.into(),
        }
    }

    fn value_at(row: &rusqlite::Row<'_>, idx: usize) -> Result<Value> {
        let value = row.get_ref(idx).map_err(source_err)?;
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        })
    }
}

impl RowSource for SqliteSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .map_err(source_err)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(source_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(source_err)?;
        Ok(names)
    }

    fn fetch_rows(&self, table: &str) -> Result<Vec<(RowId, Row)>> {
        let sql = format!("SELECT rowid, * FROM {}", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql).map_err(source_err)?;
        let column_count = stmt.column_count();

        let mut rows = Vec::new();
        let mut raw = stmt.query([]).map_err(source_err)?;
        while let Some(row) = raw.next().map_err(source_err)? {
            let id: RowId = row.get(0).map_err(source_err)?;
            let mut tuple = Row::with_capacity(column_count - 1);
            for idx in 1..column_count {
                tuple.push(Self::value_at(row, idx)?);
            }
            rows.push((id, tuple));
        }
        Ok(rows)
    }

    fn schema_descriptor(&self, table: &str) -> Result<String> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql).map_err(source_err)?;

        let mut descriptor = String::new();
        let mut raw = stmt.query([]).map_err(source_err)?;
        while let Some(row) = raw.next().map_err(source_err)? {
            let name: String = row.get(1).map_err(source_err)?;
            let col_type: String = row.get(2).map_err(source_err)?;
            let notnull: i64 = row.get(3).map_err(source_err)?;
            // dflt_value is the literal default expression as source text
            let default: Option<String> = row.get(4).map_err(source_err)?;
            let pk: i64 = row.get(5).map_err(source_err)?;

            if !descriptor.is_empty() {
                descriptor.push_str(", ");
            }
            descriptor.push_str(&name);
            if !col_type.is_empty() {
                let _ = write!(descriptor, " {}", col_type);
            }
            if notnull != 0 {
                descriptor.push_str(" NOT NULL");
            }
            if let Some(default) = default {
                let _ = write!(descriptor, " DEFAULT {}", default);
            }
            if pk != 0 {
                descriptor.push_str(" PRIMARY KEY");
            }
        }
        Ok(descriptor)
    }
}
