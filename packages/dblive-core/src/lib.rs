//! Change-detection primitives for live database monitoring.
//!
//! Provides the change record type, snapshot/diff logic, schema watching,
//! the append-only change journal, and the event dispatcher.

pub mod change;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod journal;
pub mod schema;
pub mod snapshot;
pub mod source;

pub use change::{Change, ChangeDetails, Operation, Row, RowId, Value};
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
