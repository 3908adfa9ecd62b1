//! Snapshot-vs-fetch diffing.
//!
//! Classifies row-level changes from two full table images and nothing
//! else: no write-ahead log, no triggers. Rapid insert-then-delete
//! sequences between two ticks are invisible by design.

use std::collections::HashSet;

use crate::change::{Change, ChangeDetails, Operation, Row, RowId};
use crate::snapshot::TableSnapshot;

/// Result of diffing one table for one tick.
#[derive(Debug)]
pub struct TableDiff {
    /// Detected changes: inserts/updates in fetch order, deletions last.
    pub changes: Vec<Change>,
    /// New high-water mark for the table.
    pub high_water_mark: RowId,
}

fn select_command(table: &str, id: RowId) -> String {
    format!("SELECT * FROM {} WHERE rowid = {}", table, id)
}

fn delete_command(table: &str, id: RowId) -> String {
    format!("DELETE FROM {} WHERE rowid = {}", table, id)
}

/// Diffs a fresh full fetch against the previous snapshot.
///
/// Classification per row identity in `current`:
/// - identity above the previous high-water mark: INSERT. The mark wins
///   over content equality, so a tuple identical to an old row under a new
///   identity is still an insert.
/// - identity at or below the mark with different tuple content: UPDATE.
/// - identity at or below the mark with unchanged content: no event.
///
/// Every identity present in the snapshot but absent from `current` yields
/// one DELETE carrying the last-known tuple. The returned high-water mark
/// is `max(previous mark, max identity in current)`.
pub fn diff_table(
    db_name: &str,
    table: &str,
    prev: &TableSnapshot,
    current: &[(RowId, Row)],
) -> TableDiff {
    let mut changes = Vec::new();
    let mut high_water_mark = prev.high_water_mark;
    let mut seen = HashSet::with_capacity(current.len());

    for (id, row) in current {
        seen.insert(*id);
        high_water_mark = high_water_mark.max(*id);

        if *id > prev.high_water_mark {
            changes.push(Change::new(
                db_name,
                table,
                Operation::Insert,
                select_command(table, *id),
                ChangeDetails::Row(row.clone()),
            ));
        } else if prev.rows.get(id) != Some(row) {
            changes.push(Change::new(
                db_name,
                table,
                Operation::Update,
                select_command(table, *id),
                ChangeDetails::Row(row.clone()),
            ));
        }
    }

    for (id, row) in &prev.rows {
        if !seen.contains(id) {
            changes.push(Change::new(
                db_name,
                table,
                Operation::Delete,
                delete_command(table, *id),
                ChangeDetails::Row(row.clone()),
            ));
        }
    }

    TableDiff {
        changes,
        high_water_mark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Value;

    fn row(text: &str) -> Row {
        vec![Value::Text(text.to_string())]
    }

    fn snapshot(rows: Vec<(RowId, Row)>) -> TableSnapshot {
        TableSnapshot::from_fetch(rows)
    }

    #[test]
    fn test_identity_above_mark_is_insert() {
        let prev = snapshot(vec![(1, row("A"))]);
        let diff = diff_table("db", "users", &prev, &[(1, row("A")), (2, row("B"))]);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].operation, Operation::Insert);
        assert_eq!(diff.changes[0].command, "SELECT * FROM users WHERE rowid = 2");
        assert_eq!(diff.changes[0].details, ChangeDetails::Row(row("B")));
        assert_eq!(diff.high_water_mark, 2);
    }

    #[test]
    fn test_identity_wins_over_content_equality() {
        // Row 2 has the same tuple a previous row had under identity 1;
        // it is still an insert because 2 exceeds the mark.
        let prev = snapshot(vec![(1, row("A"))]);
        let diff = diff_table("db", "users", &prev, &[(1, row("A")), (2, row("A"))]);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].operation, Operation::Insert);
    }

    #[test]
    fn test_changed_tuple_below_mark_is_update() {
        let prev = snapshot(vec![(1, row("A")), (2, row("B"))]);
        let diff = diff_table("db", "users", &prev, &[(1, row("Z")), (2, row("B"))]);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].operation, Operation::Update);
        assert_eq!(diff.changes[0].command, "SELECT * FROM users WHERE rowid = 1");
        assert_eq!(diff.high_water_mark, 2);
    }

    #[test]
    fn test_unchanged_tuples_emit_nothing() {
        let prev = snapshot(vec![(1, row("A")), (2, row("B"))]);
        let diff = diff_table("db", "users", &prev, &[(1, row("A")), (2, row("B"))]);
        assert!(diff.changes.is_empty());
    }

    #[test]
    fn test_missing_identity_is_delete_with_last_known_tuple() {
        let prev = snapshot(vec![(1, row("A")), (2, row("B"))]);
        let diff = diff_table("db", "users", &prev, &[(2, row("B"))]);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].operation, Operation::Delete);
        assert_eq!(diff.changes[0].command, "DELETE FROM users WHERE rowid = 1");
        assert_eq!(diff.changes[0].details, ChangeDetails::Row(row("A")));
    }

    #[test]
    fn test_mark_never_regresses_on_deletions() {
        let prev = snapshot(vec![(1, row("A")), (9, row("I"))]);
        let diff = diff_table("db", "users", &prev, &[(1, row("A"))]);

        assert_eq!(diff.high_water_mark, 9);
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].operation, Operation::Delete);
    }

    #[test]
    fn test_drained_table_emits_one_delete_per_row() {
        let prev = snapshot(vec![(1, row("A")), (2, row("B")), (3, row("C"))]);
        let diff = diff_table("db", "users", &prev, &[]);

        assert_eq!(diff.changes.len(), 3);
        assert!(diff
            .changes
            .iter()
            .all(|c| c.operation == Operation::Delete));
        // Deletions surface in ascending identity order.
        let ids: Vec<_> = diff
            .changes
            .iter()
            .map(|c| c.command.clone())
            .collect();
        assert_eq!(
            ids,
            vec![
                "DELETE FROM users WHERE rowid = 1",
                "DELETE FROM users WHERE rowid = 2",
                "DELETE FROM users WHERE rowid = 3",
            ]
        );
        assert_eq!(diff.high_water_mark, 3);
    }

    #[test]
    fn test_inserts_and_updates_precede_deletes() {
        let prev = snapshot(vec![(1, row("A")), (2, row("B"))]);
        let diff = diff_table(
            "db",
            "users",
            &prev,
            &[(2, row("B2")), (5, row("E"))],
        );

        let operations: Vec<_> = diff.changes.iter().map(|c| c.operation).collect();
        assert_eq!(
            operations,
            vec![Operation::Update, Operation::Insert, Operation::Delete]
        );
    }

    #[test]
    fn test_identity_below_mark_missing_from_snapshot_is_update() {
        // Identity 3 is below the mark but was never in the snapshot; it
        // reads as an update of an unknown row, not an insert.
        let prev = snapshot(vec![(5, row("E"))]);
        let diff = diff_table("db", "users", &prev, &[(3, row("C")), (5, row("E"))]);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].operation, Operation::Update);
        assert_eq!(diff.high_water_mark, 5);
    }

    #[test]
    fn test_empty_to_empty_is_quiet() {
        let prev = snapshot(Vec::new());
        let diff = diff_table("db", "users", &prev, &[]);
        assert!(diff.changes.is_empty());
        assert_eq!(diff.high_water_mark, 0);
    }
}
