//! Monitor configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between polling ticks
    pub poll_interval: Duration,
    /// Path of the append-only change journal
    pub journal_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            journal_path: PathBuf::from("./changes_log.json"),
        }
    }
}
