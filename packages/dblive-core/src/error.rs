//! Monitor error types.

use thiserror::Error;

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised by the change-detection engine.
#[derive(Error, Debug, Clone)]
pub enum MonitorError {
    /// Failure talking to the row/schema source (connect, table list, row fetch)
    #[error("Source access failed: {0}")]
    SourceAccess(String),

    /// Failure fetching or comparing a table's schema descriptor
    #[error("Schema watch failed for table '{table}': {message}")]
    SchemaWatch { table: String, message: String },

    /// Failure appending a change record to the journal
    #[error("Journal write failed: {0}")]
    JournalWrite(String),

    /// A registered event handler returned an error or panicked
    #[error("Handler for event '{event}' failed: {message}")]
    Handler { event: String, message: String },

    /// Change record encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MonitorError {
    /// Classifies an I/O error into a journal write error, keeping context.
    pub fn journal_io(context: &str, error: std::io::Error) -> Self {
        MonitorError::JournalWrite(format!("{}: {}", context, error))
    }
}
