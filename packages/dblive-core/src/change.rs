//! Change records emitted by the diff engine and the schema watcher.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Row identity within a table (the source's native row id, e.g. SQLite rowid).
pub type RowId = i64;

/// An ordered tuple of column values, as fetched from the source.
pub type Row = Vec<Value>;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Real(f64),
    /// Text value
    Text(String),
    /// Binary value
    Blob(Vec<u8>),
}

/// Kind of change detected for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Row identity above the previous high-water mark
    Insert,
    /// Known row identity with different tuple content
    Update,
    /// Previously known row identity absent from the latest fetch
    Delete,
    /// Table schema descriptor differs from the stored one
    SchemaChange,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::SchemaChange => "SCHEMA_CHANGE",
        };
        f.write_str(name)
    }
}

/// Payload of a change: the affected row tuple, or both schema descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeDetails {
    /// Row tuple: the current content for inserts/updates, the last-known
    /// content for deletes
    Row(Row),
    /// Old and new schema descriptors
    Schema {
        old_schema: String,
        new_schema: String,
    },
}

/// One detected row or schema mutation.
///
/// Created exclusively by the diff engine and the schema watcher; never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Wall-clock time the change was detected (`%Y-%m-%d %H:%M:%S`)
    pub timestamp: String,
    /// Identifier of the monitored source
    pub db_name: String,
    /// Table the change belongs to
    pub table_name: String,
    /// Change kind
    pub operation: Operation,
    /// Statement describing how to reproduce/observe the change
    pub command: String,
    /// Row tuple or schema descriptor pair
    pub details: ChangeDetails,
}

impl Change {
    /// Creates a change record stamped with the current wall-clock time.
    pub fn new(
        db_name: impl Into<String>,
        table_name: impl Into<String>,
        operation: Operation,
        command: String,
        details: ChangeDetails,
    ) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            db_name: db_name.into(),
            table_name: table_name.into(),
            operation,
            command,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&Operation::SchemaChange).unwrap(),
            "\"SCHEMA_CHANGE\""
        );
        assert_eq!(serde_json::to_string(&Operation::Insert).unwrap(), "\"INSERT\"");
    }

    #[test]
    fn test_row_details_serialize_as_tuple() {
        let details = ChangeDetails::Row(vec![
            Value::Integer(1),
            Value::Text("A".to_string()),
            Value::Null,
        ]);
        let json = serde_json::to_string(&details).unwrap();
        assert_eq!(json, "[1,\"A\",null]");

        let back: ChangeDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(back, details);
    }

    #[test]
    fn test_schema_details_carry_both_descriptors() {
        let details = ChangeDetails::Schema {
            old_schema: "id INTEGER".to_string(),
            new_schema: "id INTEGER, name TEXT".to_string(),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["old_schema"], "id INTEGER");
        assert_eq!(json["new_schema"], "id INTEGER, name TEXT");
    }

    #[test]
    fn test_change_round_trip() {
        let change = Change::new(
            "test.db",
            "users",
            Operation::Update,
            "SELECT * FROM users WHERE rowid = 1".to_string(),
            ChangeDetails::Row(vec![Value::Integer(1), Value::Text("Z".to_string())]),
        );
        let line = serde_json::to_string(&change).unwrap();
        let back: Change = serde_json::from_str(&line).unwrap();
        assert_eq!(back, change);
    }
}
