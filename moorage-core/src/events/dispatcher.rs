//! EventDispatcher: synchronous event dispatch with zero overhead when empty.

use std::sync::Arc;

use super::handler::PoolEventHandler;
use super::types::*;

/// Synchronous event dispatcher wrapping a list of handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn PoolEventHandler>>,
}

impl EventDispatcher {
    /// Create a new empty dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register an event handler.
    pub fn register(&mut self, handler: Arc<dyn PoolEventHandler>) {
        self.handlers.push(handler);
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Emit an event to all registered handlers.
    /// A panicking handler is logged and does not stop the others.
    fn emit<F: Fn(&dyn PoolEventHandler)>(&self, f: F) {
        for handler in &self.handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(handler.as_ref());
            }));
            if result.is_err() {
                tracing::warn!("pool event handler panicked");
            }
        }
    }

    pub fn emit_borrow(&self, event: &BorrowEvent) {
        self.emit(|h| h.on_borrow(event));
    }

    pub fn emit_return(&self, event: &ReturnEvent) {
        self.emit(|h| h.on_return(event));
    }

    pub fn emit_rebuild(&self, event: &RebuildEvent) {
        self.emit(|h| h.on_rebuild(event));
    }

    pub fn emit_parked(&self, event: &ParkedEvent) {
        self.emit(|h| h.on_parked(event));
    }

    pub fn emit_emergency_rollback(&self, event: &EmergencyRollbackEvent) {
        self.emit(|h| h.on_emergency_rollback(event));
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
