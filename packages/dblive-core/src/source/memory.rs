//! In-memory row source.
//!
//! Tables live behind a shared handle, so one clone can be polled by a
//! monitor while another mutates the data. Used by the integration tests
//! and handy for embedding without a database file.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::change::{Row, RowId};
use crate::error::{MonitorError, Result};

use super::RowSource;

struct TableData {
    rows: BTreeMap<RowId, Row>,
    schema: String,
}

struct Inner {
    // Creation order is preserved; it defines the fixed table iteration order.
    tables: Vec<(String, TableData)>,
}

/// Shared in-memory row source.
#[derive(Clone)]
pub struct MemorySource {
    identifier: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    /// Creates an empty source with the given identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            inner: Arc::new(Mutex::new(Inner { tables: Vec::new() })),
        }
    }

    /// Adds an empty table with the given schema descriptor.
    pub fn add_table(&self, name: impl Into<String>, schema: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.tables.push((
            name.into(),
            TableData {
                rows: BTreeMap::new(),
                schema: schema.into(),
            },
        ));
    }

    /// Inserts or overwrites a row.
    pub fn put_row(&self, table: &str, id: RowId, row: Row) -> Result<()> {
        self.with_table(table, |data| {
            data.rows.insert(id, row);
        })
    }

    /// Removes a row, if present.
    pub fn remove_row(&self, table: &str, id: RowId) -> Result<()> {
        self.with_table(table, |data| {
            data.rows.remove(&id);
        })
    }

    /// Removes every row of a table.
    pub fn clear_table(&self, table: &str) -> Result<()> {
        self.with_table(table, |data| {
            data.rows.clear();
        })
    }

    /// Replaces the table's schema descriptor.
    pub fn set_schema(&self, table: &str, schema: impl Into<String>) -> Result<()> {
        let schema = schema.into();
        self.with_table(table, |data| {
            data.schema = schema;
        })
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&mut TableData) -> T) -> Result<T> {
        let mut inner = self.inner.lock();
        let data = inner
            .tables
            .iter_mut()
            .find(|(name, _)| name == table)
            .map(|(_, data)| data)
            .ok_or_else(|| MonitorError::SourceAccess(format!("table '{}' not found", table)))?;
        Ok(f(data))
    }
}

impl RowSource for MemorySource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        Ok(inner.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    fn fetch_rows(&self, table: &str) -> Result<Vec<(RowId, Row)>> {
        self.with_table(table, |data| {
            data.rows
                .iter()
                .map(|(id, row)| (*id, row.clone()))
                .collect()
        })
    }

    fn schema_descriptor(&self, table: &str) -> Result<String> {
        self.with_table(table, |data| data.schema.clone())
    }
}
