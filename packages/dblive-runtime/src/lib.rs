//! Polling scheduler for live database monitoring.
//!
//! Owns the background tick loop: each tick fetches every tracked table,
//! diffs it against the previous snapshot, journals and dispatches the
//! detected changes, then watches the table's schema for drift. Lifecycle
//! is explicit: `start` spawns the loop, `stop` blocks until it has fully
//! terminated, `run` drives the same loop in the caller's thread.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use dblive_core::change::Change;
use dblive_core::config::MonitorConfig;
use dblive_core::diff::diff_table;
use dblive_core::error::{MonitorError, Result};
use dblive_core::events::{EventContext, EventDispatcher, HandlerResult};
use dblive_core::journal::ChangeJournal;
use dblive_core::schema::SchemaWatcher;
use dblive_core::snapshot::{SnapshotStore, TableSnapshot};
use dblive_core::source::RowSource;

pub use dblive_core::events::{CHANGE_DETECTED, SCHEMA_CHANGE_DETECTED};

/// Monitor counters, shared between the loop and external observers.
#[derive(Debug, Default)]
struct MonitorStats {
    /// Completed and in-flight ticks
    ticks: AtomicU64,
    /// Changes emitted (journal + dispatch attempted for each)
    changes_emitted: AtomicU64,
    /// Failed journal appends
    journal_errors: AtomicU64,
    /// Failed handler invocations
    handler_errors: AtomicU64,
}

/// Point-in-time view of the monitor counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub changes_emitted: u64,
    pub journal_errors: u64,
    pub handler_errors: u64,
}

/// State shared across threads: the handler registry and counters.
struct MonitorShared {
    source_id: String,
    dispatcher: EventDispatcher,
    stats: MonitorStats,
}

/// Everything the tick loop owns exclusively while it runs.
struct PollTask {
    source: Box<dyn RowSource>,
    db_name: String,
    /// Tracked tables in the order established at construction. Tables
    /// created in the source afterwards are never picked up.
    tables: Vec<String>,
    snapshots: SnapshotStore,
    schema_watcher: SchemaWatcher,
    journal: ChangeJournal,
    shared: Arc<MonitorShared>,
}

impl PollTask {
    /// Runs the loop until the shutdown channel fires or disconnects.
    fn run_loop(&mut self, shutdown: &mpsc::Receiver<()>, interval: Duration) {
        tracing::debug!("Poll loop entered for '{}'", self.db_name);
        loop {
            self.tick();
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("Poll loop exited for '{}'", self.db_name);
    }

    /// One full pass over all tracked tables, in fixed order.
    ///
    /// A failure while processing one table is logged and never stops the
    /// other tables from being processed in the same tick.
    fn tick(&mut self) {
        let tick = self.shared.stats.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        for index in 0..self.tables.len() {
            let table = self.tables[index].clone();
            if let Err(e) = self.process_table(&table, tick) {
                tracing::error!("Tick {}: error processing table '{}': {}", tick, table, e);
            }
        }
    }

    /// Diffs one table, updates its snapshot, then watches its schema.
    fn process_table(&mut self, table: &str, tick: u64) -> Result<()> {
        let current = self.source.fetch_rows(table)?;

        let diff = {
            let empty = TableSnapshot::default();
            let prev = self.snapshots.get(table).unwrap_or(&empty);
            diff_table(&self.db_name, table, prev, &current)
        };

        for change in &diff.changes {
            self.emit(tick, CHANGE_DETECTED, change);
        }

        // The stored image becomes the raw fetch result of this tick;
        // handler-triggered writes to tables already visited surface on
        // the next tick, never retroactively within this one.
        let rows: BTreeMap<_, _> = current.into_iter().collect();
        self.snapshots.replace(table, rows, diff.high_water_mark);

        let descriptor = match self.source.schema_descriptor(table) {
            Ok(descriptor) => descriptor,
            Err(MonitorError::SourceAccess(message)) => {
                return Err(MonitorError::SchemaWatch {
                    table: table.to_string(),
                    message,
                })
            }
            Err(e) => return Err(e),
        };
        if let Some(change) = self.schema_watcher.observe(&self.db_name, table, &descriptor) {
            self.emit(tick, SCHEMA_CHANGE_DETECTED, &change);
        }

        Ok(())
    }

    /// Journals and dispatches one change.
    ///
    /// Both are attempted unconditionally: a journal failure does not
    /// suppress handler delivery, and handler failures do not suppress
    /// the journal write.
    fn emit(&mut self, tick: u64, event: &'static str, change: &Change) {
        self.shared.stats.changes_emitted.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.journal.append(change) {
            self.shared.stats.journal_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                "Journal append failed for {} on '{}': {}",
                change.operation,
                change.table_name,
                e
            );
        }

        let ctx = EventContext {
            source: &self.db_name,
            tick,
        };
        for error in self.shared.dispatcher.dispatch(&ctx, event, change) {
            self.shared.stats.handler_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("{}", error);
        }
    }
}

/// Lifecycle of the polling loop.
enum LifecycleState {
    /// Loop not running; the task is parked here between runs.
    Stopped(Box<PollTask>),
    /// Loop running on the monitor's own background thread.
    Background {
        shutdown_tx: mpsc::Sender<()>,
        handle: JoinHandle<Box<PollTask>>,
    },
    /// Loop running inline in a caller's thread via `run`.
    Inline {
        shutdown_tx: mpsc::Sender<()>,
        done_rx: mpsc::Receiver<Box<PollTask>>,
    },
    /// The loop thread panicked and the task was lost.
    Failed,
}

/// Polling-based change monitor with explicit lifecycle control.
///
/// `start`, `stop`, `restart`, `register` and `stats` may be called from
/// any thread, concurrently with the running loop.
pub struct LiveMonitor {
    shared: Arc<MonitorShared>,
    state: Mutex<LifecycleState>,
    poll_interval: Duration,
}

impl std::fmt::Debug for LiveMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveMonitor")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl LiveMonitor {
    /// Creates a monitor over `source`.
    ///
    /// Enumerates the source's tables and takes one baseline snapshot per
    /// table; the table set and order are fixed from here on. Construction
    /// failures (table enumeration, baseline fetch, journal open)
    /// propagate to the caller.
    pub fn new(source: impl RowSource + 'static, config: MonitorConfig) -> Result<Self> {
        let db_name = source.identifier().to_string();
        let tables = source.list_tables()?;

        let mut snapshots = SnapshotStore::new();
        for table in &tables {
            let rows = source.fetch_rows(table)?;
            snapshots.seed(table.clone(), rows);
        }

        let journal = ChangeJournal::open(&config.journal_path)?;

        tracing::info!(
            "Monitoring {} tables in '{}' (interval {:?}, journal {})",
            tables.len(),
            db_name,
            config.poll_interval,
            journal.path().display()
        );

        let shared = Arc::new(MonitorShared {
            source_id: db_name.clone(),
            dispatcher: EventDispatcher::new(),
            stats: MonitorStats::default(),
        });

        let task = Box::new(PollTask {
            source: Box::new(source),
            db_name,
            tables,
            snapshots,
            schema_watcher: SchemaWatcher::new(),
            journal,
            shared: shared.clone(),
        });

        Ok(Self {
            shared,
            state: Mutex::new(LifecycleState::Stopped(task)),
            poll_interval: config.poll_interval,
        })
    }

    /// Registers a handler for `change_detected` or
    /// `schema_change_detected`; other event names are silently ignored.
    pub fn register<F>(&self, event: &str, handler: F)
    where
        F: Fn(&EventContext<'_>, &Change) -> HandlerResult + Send + Sync + 'static,
    {
        self.shared.dispatcher.register(event, handler);
    }

    /// Identifier of the monitored source.
    pub fn identifier(&self) -> &str {
        &self.shared.source_id
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.shared.stats.ticks.load(Ordering::SeqCst),
            changes_emitted: self.shared.stats.changes_emitted.load(Ordering::SeqCst),
            journal_errors: self.shared.stats.journal_errors.load(Ordering::SeqCst),
            handler_errors: self.shared.stats.handler_errors.load(Ordering::SeqCst),
        }
    }

    /// Starts the background loop. No-op if already running.
    pub fn start(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, LifecycleState::Failed) {
            LifecycleState::Stopped(mut task) => {
                let (shutdown_tx, shutdown_rx) = mpsc::channel();
                let interval = self.poll_interval;
                let handle = thread::spawn(move || {
                    task.run_loop(&shutdown_rx, interval);
                    task
                });
                tracing::info!("Monitor started for '{}'", self.shared.source_id);
                *state = LifecycleState::Background { shutdown_tx, handle };
            }
            running @ (LifecycleState::Background { .. } | LifecycleState::Inline { .. }) => {
                *state = running;
            }
            LifecycleState::Failed => {
                tracing::error!("Cannot start: a previous poll loop panicked");
            }
        }
    }

    /// Stops the loop, blocking until it has fully terminated.
    ///
    /// After this returns, no further polls or dispatches from this
    /// instance occur until `start` is called again. No-op if already
    /// stopped; safe under concurrent invocation (racing callers
    /// serialize, the loser observes the stopped state).
    pub fn stop(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, LifecycleState::Failed) {
            LifecycleState::Stopped(task) => {
                *state = LifecycleState::Stopped(task);
            }
            LifecycleState::Background { shutdown_tx, handle } => {
                let _ = shutdown_tx.send(());
                match handle.join() {
                    Ok(task) => {
                        tracing::info!("Monitor stopped for '{}'", self.shared.source_id);
                        *state = LifecycleState::Stopped(task);
                    }
                    Err(_) => {
                        tracing::error!("Poll loop thread panicked");
                    }
                }
            }
            LifecycleState::Inline { shutdown_tx, done_rx } => {
                let _ = shutdown_tx.send(());
                match done_rx.recv() {
                    Ok(task) => {
                        tracing::info!("Monitor stopped for '{}'", self.shared.source_id);
                        *state = LifecycleState::Stopped(task);
                    }
                    Err(_) => {
                        tracing::error!("Inline poll loop dropped without handing back");
                    }
                }
            }
            LifecycleState::Failed => {}
        }
    }

    /// Stops the loop, then starts it again.
    pub fn restart(&self) {
        self.stop();
        self.start();
    }

    /// Runs the poll loop inline in the calling thread.
    ///
    /// Blocks until another thread calls `stop`. No-op (with a warning)
    /// if the monitor is already running.
    pub fn run(&self) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let mut task = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, LifecycleState::Failed) {
                LifecycleState::Stopped(task) => {
                    *state = LifecycleState::Inline { shutdown_tx, done_rx };
                    task
                }
                running @ (LifecycleState::Background { .. } | LifecycleState::Inline { .. }) => {
                    tracing::warn!("run() called while the monitor is already running");
                    *state = running;
                    return;
                }
                LifecycleState::Failed => {
                    tracing::error!("Cannot run: a previous poll loop panicked");
                    return;
                }
            }
        };

        task.run_loop(&shutdown_rx, self.poll_interval);
        // Hand the task back to the stop() call that ended the loop.
        let _ = done_tx.send(task);
    }

    /// Executes a single tick synchronously.
    ///
    /// Only valid while stopped; used by tests and embedders that drive
    /// the loop themselves.
    pub fn tick(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            LifecycleState::Stopped(task) => task.tick(),
            _ => tracing::warn!("tick() called while the monitor is running"),
        }
    }
}
