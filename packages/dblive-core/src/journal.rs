//! Append-only change journal.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::change::Change;
use crate::error::{MonitorError, Result};

/// Durable sink for change records.
///
/// One record is one newline-delimited JSON object and one unbuffered
/// write; there is no batching. Journal writes are independent of event
/// dispatch: a failed append never suppresses handler delivery and a
/// failed dispatch never suppresses the append.
#[derive(Debug)]
pub struct ChangeJournal {
    file: File,
    path: PathBuf,
}

impl ChangeJournal {
    /// Opens (creating if necessary) a journal file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| MonitorError::journal_io("Failed to open journal", e))?;
        Ok(Self { file, path })
    }

    /// Appends one change record and flushes it immediately.
    pub fn append(&mut self, change: &Change) -> Result<()> {
        let mut line = serde_json::to_string(change)
            .map_err(|e| MonitorError::Serialization(e.to_string()))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| MonitorError::journal_io("Failed to append change", e))?;
        self.file
            .flush()
            .map_err(|e| MonitorError::journal_io("Failed to flush journal", e))?;
        Ok(())
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a journal file back into change records.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<Change>> {
        let file = File::open(path.as_ref())
            .map_err(|e| MonitorError::journal_io("Failed to open journal for replay", e))?;
        let reader = BufReader::new(file);

        let mut changes = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| MonitorError::journal_io("Failed to read journal", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let change = serde_json::from_str(&line)
                .map_err(|e| MonitorError::Serialization(e.to_string()))?;
            changes.push(change);
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeDetails, Operation, Value};

    fn sample_change(table: &str) -> Change {
        Change::new(
            "test.db",
            table,
            Operation::Insert,
            format!("SELECT * FROM {} WHERE rowid = 1", table),
            ChangeDetails::Row(vec![Value::Integer(1), Value::Text("A".to_string())]),
        )
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.json");

        let mut journal = ChangeJournal::open(&path).unwrap();
        journal.append(&sample_change("users")).unwrap();
        journal.append(&sample_change("orders")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_replay_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.json");

        let change = sample_change("users");
        let mut journal = ChangeJournal::open(&path).unwrap();
        journal.append(&change).unwrap();

        let replayed = ChangeJournal::replay(&path).unwrap();
        assert_eq!(replayed, vec![change]);
    }

    #[test]
    fn test_append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.json");

        ChangeJournal::open(&path)
            .unwrap()
            .append(&sample_change("users"))
            .unwrap();
        ChangeJournal::open(&path)
            .unwrap()
            .append(&sample_change("orders"))
            .unwrap();

        assert_eq!(ChangeJournal::replay(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_replay_missing_file_is_journal_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChangeJournal::replay(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MonitorError::JournalWrite(_)));
    }
}
