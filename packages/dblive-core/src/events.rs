//! Named-event handler registry with isolated invocation.
//!
//! The registry is owned by its monitor instance; there is no process-wide
//! handler state. Only pre-declared event names accept registrations.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::change::Change;
use crate::error::MonitorError;

/// Event fired for every row-level INSERT/UPDATE/DELETE.
pub const CHANGE_DETECTED: &str = "change_detected";

/// Event fired for every detected schema change.
pub const SCHEMA_CHANGE_DETECTED: &str = "schema_change_detected";

/// Context handed to handlers alongside the change record.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    /// Identifier of the monitored source
    pub source: &'a str,
    /// Tick the change was detected in
    pub tick: u64,
}

/// Outcome of one handler invocation.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Handler = Arc<dyn Fn(&EventContext<'_>, &Change) -> HandlerResult + Send + Sync>;

/// Named-event → ordered-handler-list registry.
pub struct EventDispatcher {
    handlers: RwLock<HashMap<&'static str, Vec<Handler>>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Creates a dispatcher with the recognized event names pre-declared.
    pub fn new() -> Self {
        let mut handlers = HashMap::new();
        handlers.insert(CHANGE_DETECTED, Vec::new());
        handlers.insert(SCHEMA_CHANGE_DETECTED, Vec::new());
        Self {
            handlers: RwLock::new(handlers),
        }
    }

    /// Appends a handler to an event's invocation list.
    ///
    /// Registration order is invocation order. Registering for an event
    /// name the dispatcher does not pre-declare is silently ignored.
    pub fn register<F>(&self, event: &str, handler: F)
    where
        F: Fn(&EventContext<'_>, &Change) -> HandlerResult + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write();
        match handlers.get_mut(event) {
            Some(list) => list.push(Arc::new(handler)),
            None => {
                tracing::debug!("Ignoring handler registration for unknown event '{}'", event);
            }
        }
    }

    /// Number of handlers registered for an event.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }

    /// Invokes every handler registered for `event`, in registration order.
    ///
    /// Each handler is isolated: an error return or a panic is wrapped
    /// into `MonitorError::Handler` and collected, and later handlers in
    /// the same dispatch still run. The collected errors are returned to
    /// the caller's tick-containment logic.
    pub fn dispatch(
        &self,
        ctx: &EventContext<'_>,
        event: &str,
        change: &Change,
    ) -> Vec<MonitorError> {
        // Snapshot the list so a handler may register further handlers
        // without deadlocking against the registry lock.
        let handlers: Vec<Handler> = match self.handlers.read().get(event) {
            Some(list) => list.clone(),
            None => return Vec::new(),
        };

        let mut errors = Vec::new();
        for (index, handler) in handlers.iter().enumerate() {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, change)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(MonitorError::Handler {
                    event: event.to_string(),
                    message: format!("handler #{}: {}", index, e),
                }),
                Err(panic) => {
                    let message = if let Some(msg) = panic.downcast_ref::<&str>() {
                        msg.to_string()
                    } else if let Some(msg) = panic.downcast_ref::<String>() {
                        msg.clone()
                    } else {
                        "unknown panic".to_string()
                    };
                    errors.push(MonitorError::Handler {
                        event: event.to_string(),
                        message: format!("handler #{} panicked: {}", index, message),
                    });
                }
            }
        }
        errors
    }
}
