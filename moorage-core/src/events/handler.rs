//! PoolEventHandler trait, all methods with no-op defaults.

use super::types::*;

/// Handles pool and scope telemetry.
///
/// Handlers only override the events they care about.
pub trait PoolEventHandler: Send + Sync {
    fn on_borrow(&self, _event: &BorrowEvent) {}
    fn on_return(&self, _event: &ReturnEvent) {}
    fn on_rebuild(&self, _event: &RebuildEvent) {}
    fn on_parked(&self, _event: &ParkedEvent) {}
    fn on_emergency_rollback(&self, _event: &EmergencyRollbackEvent) {}
}
