//! Previous-state images and high-water marks.

use std::collections::{BTreeMap, HashMap};

use crate::change::{Row, RowId};

/// Full image of one table as of the end of the previous tick.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    /// Row identity → row tuple. Ascending iteration order fixes the order
    /// in which missing identities are discovered during diffing.
    pub rows: BTreeMap<RowId, Row>,
    /// Largest row identity ever observed for this table (0 when empty;
    /// never regresses, even across deletions).
    pub high_water_mark: RowId,
}

impl TableSnapshot {
    /// Builds a baseline snapshot from an initial full fetch.
    pub fn from_fetch(rows: Vec<(RowId, Row)>) -> Self {
        let mut map = BTreeMap::new();
        let mut high_water_mark = 0;
        for (id, row) in rows {
            high_water_mark = high_water_mark.max(id);
            map.insert(id, row);
        }
        Self {
            rows: map,
            high_water_mark,
        }
    }
}

/// Per-table snapshot storage, owned by the scheduler's execution context.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    tables: HashMap<String, TableSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a table's baseline snapshot from its initial full fetch.
    pub fn seed(&mut self, table: impl Into<String>, rows: Vec<(RowId, Row)>) {
        self.tables.insert(table.into(), TableSnapshot::from_fetch(rows));
    }

    /// Returns the stored snapshot for a table.
    pub fn get(&self, table: &str) -> Option<&TableSnapshot> {
        self.tables.get(table)
    }

    /// Swaps the stored snapshot and high-water mark for a table wholesale.
    ///
    /// Callers must have already diffed against the snapshot being replaced.
    /// There is no incremental update path: the stored image is always the
    /// raw fetch result of the last completed tick.
    pub fn replace(&mut self, table: &str, rows: BTreeMap<RowId, Row>, high_water_mark: RowId) {
        if let Some(existing) = self.tables.get(table) {
            debug_assert!(high_water_mark >= existing.high_water_mark);
        }
        self.tables.insert(
            table.to_string(),
            TableSnapshot {
                rows,
                high_water_mark,
            },
        );
    }
}
