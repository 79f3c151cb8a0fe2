//! Transaction status and the default thread-safe transaction.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
}

impl TransactionStatus {
    /// Committed or rolled back.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// A transaction attached to a storage handle.
pub trait Transaction: Send + Sync {
    fn status(&self) -> TransactionStatus;

    /// Roll back, recording `reason` when the rollback was forced.
    fn roll_back(&self, reason: Option<StorageError>);
}

/// Default implementation of a transaction.
///
/// Resolving an already-resolved transaction is a no-op.
#[derive(Debug)]
pub struct BasicTransaction {
    state: Mutex<TransactionState>,
}

#[derive(Debug)]
struct TransactionState {
    status: TransactionStatus,
    rollback_reason: Option<StorageError>,
}

impl BasicTransaction {
    /// Create a new active transaction.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TransactionState {
                status: TransactionStatus::Active,
                rollback_reason: None,
            }),
        }
    }

    /// Commit. Returns `false` if the transaction was already resolved.
    pub fn commit(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.status.is_resolved() {
            return false;
        }
        state.status = TransactionStatus::Committed;
        true
    }

    /// The reason passed to a forced rollback.
    pub fn rollback_reason(&self) -> Option<StorageError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rollback_reason
            .clone()
    }
}

impl Default for BasicTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction for BasicTransaction {
    fn status(&self) -> TransactionStatus {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).status
    }

    fn roll_back(&self, reason: Option<StorageError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.status.is_resolved() {
            return;
        }
        state.status = TransactionStatus::RolledBack;
        state.rollback_reason = reason;
    }
}
