//! Release-safety checks for handles leaving a borrower.

use moorage_core::errors::StorageError;
use moorage_core::traits::{current_transaction, Storage, TransactionStatus};

/// A handle may go back to its pool only when it has no transaction or the
/// transaction is committed or rolled back.
pub fn is_safe_to_return(storage: &dyn Storage) -> bool {
    current_transaction(storage).map_or(true, |transaction| transaction.status().is_resolved())
}

/// Force-roll back an active transaction on a handle that is being let go.
///
/// The rollback carries an [`StorageError::IntegrityViolation`] naming the
/// storage. Returns `true` if a rollback was forced. Never fails: this runs
/// on teardown paths.
pub fn emergency_abort_if_needed(storage: &dyn Storage) -> bool {
    let Some(transaction) = current_transaction(storage) else {
        return false;
    };
    if transaction.status() != TransactionStatus::Active {
        return false;
    }

    let reason = StorageError::IntegrityViolation {
        storage_name: storage.storage_name().to_string(),
        storage_type: storage.storage_type().to_string(),
    };
    tracing::error!(
        storage_name = %storage.storage_name(),
        storage_type = storage.storage_type(),
        "{reason}"
    );
    transaction.roll_back(Some(reason));
    true
}
