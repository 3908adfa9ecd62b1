//! Schema drift detection.

use std::collections::HashMap;

use crate::change::{Change, ChangeDetails, Operation};

/// Watches table schema descriptors for drift.
///
/// Descriptors are opaque strings compared by whole-value equality; there
/// is no structural diff. A whitespace-only edit to a column definition is
/// a schema change.
#[derive(Debug, Default)]
pub struct SchemaWatcher {
    descriptors: HashMap<String, String>,
}

impl SchemaWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the table's current descriptor and reports drift.
    ///
    /// The first observation of a table seeds the stored descriptor
    /// silently; there is no "before" to compare against. On a mismatch
    /// the stored value is overwritten before the change is returned, so a
    /// downstream journal or dispatch failure cannot re-emit it.
    pub fn observe(&mut self, db_name: &str, table: &str, current: &str) -> Option<Change> {
        let previous = self
            .descriptors
            .insert(table.to_string(), current.to_string());

        match previous {
            None => None,
            Some(prev) if prev == current => None,
            Some(prev) => Some(Change::new(
                db_name,
                table,
                Operation::SchemaChange,
                format!("PRAGMA table_info({})", table),
                ChangeDetails::Schema {
                    old_schema: prev,
                    new_schema: current.to_string(),
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_seeds_silently() {
        let mut watcher = SchemaWatcher::new();
        assert!(watcher
            .observe("db", "users", "id INTEGER, name TEXT")
            .is_none());
    }

    #[test]
    fn test_mismatch_emits_schema_change_with_both_descriptors() {
        let mut watcher = SchemaWatcher::new();
        watcher.observe("db", "users", "id INTEGER, name TEXT");

        let change = watcher
            .observe("db", "users", "id INTEGER, name TEXT, age INTEGER")
            .unwrap();

        assert_eq!(change.operation, Operation::SchemaChange);
        assert_eq!(change.command, "PRAGMA table_info(users)");
        assert_eq!(
            change.details,
            ChangeDetails::Schema {
                old_schema: "id INTEGER, name TEXT".to_string(),
                new_schema: "id INTEGER, name TEXT, age INTEGER".to_string(),
            }
        );
    }

    #[test]
    fn test_descriptor_overwritten_even_after_emission() {
        let mut watcher = SchemaWatcher::new();
        watcher.observe("db", "users", "a");
        assert!(watcher.observe("db", "users", "b").is_some());
        // The new descriptor was stored: observing it again is quiet.
        assert!(watcher.observe("db", "users", "b").is_none());
    }

    #[test]
    fn test_whitespace_difference_is_a_change() {
        let mut watcher = SchemaWatcher::new();
        watcher.observe("db", "users", "id INTEGER, name TEXT");
        let change = watcher.observe("db", "users", "id  INTEGER, name TEXT");
        assert!(change.is_some());
    }

    #[test]
    fn test_tables_tracked_independently() {
        let mut watcher = SchemaWatcher::new();
        watcher.observe("db", "users", "a");
        assert!(watcher.observe("db", "orders", "a").is_none());
        assert!(watcher.observe("db", "users", "b").is_some());
    }
}
