//! Tails live changes of a SQLite database.
//!
//! Opens the database, starts the monitor, prints every detected change
//! to stdout, and shuts down cleanly on Ctrl+C.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;

use dblive_core::change::ChangeDetails;
use dblive_core::config::MonitorConfig;
use dblive_core::source::SqliteSource;
use dblive_runtime::{LiveMonitor, CHANGE_DETECTED, SCHEMA_CHANGE_DETECTED};

/// Command-line arguments for the change tailer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file to monitor
    db_path: PathBuf,

    /// Polling interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Path of the append-only change journal
    #[arg(long, default_value = "./changes_log.json")]
    journal: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt::init();

    let config = MonitorConfig {
        poll_interval: Duration::from_millis(args.interval_ms),
        journal_path: args.journal.clone(),
    };

    let source = SqliteSource::open(&args.db_path)
        .with_context(|| format!("Failed to open {}", args.db_path.display()))?;
    let monitor = LiveMonitor::new(source, config)
        .with_context(|| format!("Failed to monitor {}", args.db_path.display()))?;

    for event in [CHANGE_DETECTED, SCHEMA_CHANGE_DETECTED] {
        monitor.register(event, |_, change| {
            match &change.details {
                ChangeDetails::Row(row) => {
                    println!(
                        "[{}] {} {} {:?}",
                        change.timestamp, change.operation, change.table_name, row
                    );
                }
                ChangeDetails::Schema {
                    old_schema,
                    new_schema,
                } => {
                    println!(
                        "[{}] {} {}: \"{}\" -> \"{}\"",
                        change.timestamp, change.operation, change.table_name, old_schema, new_schema
                    );
                }
            }
            Ok(())
        });
    }

    monitor.start();
    println!("Watching {} (Ctrl+C to stop)", args.db_path.display());
    println!("  Interval: {} ms", args.interval_ms);
    println!("  Journal: {}", args.journal.display());

    signal::ctrl_c().await.context("Failed to listen for ctrl_c")?;
    println!("\nStopping monitor...");
    monitor.stop();

    let stats = monitor.stats();
    println!(
        "Done: {} ticks, {} changes, {} journal errors, {} handler errors",
        stats.ticks, stats.changes_emitted, stats.journal_errors, stats.handler_errors
    );

    Ok(())
}
