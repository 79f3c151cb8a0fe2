//! Storage-layer errors: lookup, borrowing, transactions, and integrity.

use super::error_code::{self, MoorageErrorCode};

/// Errors raised while borrowing, using, or returning a storage handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage {storage_name} not found")]
    NotFound { storage_name: String },

    #[error("Storage error: {message}")]
    Backend { message: String },

    #[error("Storage {storage} does not support transactions")]
    TransactionsUnsupported { storage: String },

    /// Programmer error: a one-shot setting was applied twice.
    #[error("{what} is already configured")]
    AlreadyConfigured { what: String },

    /// A handle was released while its transaction was unresolved.
    /// Carried as the rollback reason, never returned from a release path.
    #[error(
        "The storage {storage_name} ({storage_type}) was released while the transaction \
         was not completed! Critical state integrity error."
    )]
    IntegrityViolation {
        storage_name: String,
        storage_type: String,
    },

    #[error("Storage pool {storage_name} exhausted after waiting {waited_ms}ms")]
    PoolExhausted { storage_name: String, waited_ms: u64 },

    #[error("Storage {storage_name} was already returned to its pool")]
    Released { storage_name: String },

    #[error("{what} lock poisoned")]
    LockPoisoned { what: String },
}

impl StorageError {
    /// Shorthand for a generic backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Shorthand for a poisoned lock guarding `what`.
    pub fn poisoned(what: &str) -> Self {
        Self::LockPoisoned {
            what: what.to_string(),
        }
    }
}

impl MoorageErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => error_code::STORAGE_NOT_FOUND,
            Self::Backend { .. } => error_code::STORAGE_ERROR,
            Self::TransactionsUnsupported { .. } => error_code::TRANSACTIONS_UNSUPPORTED,
            Self::AlreadyConfigured { .. } => error_code::ALREADY_CONFIGURED,
            Self::IntegrityViolation { .. } => error_code::INTEGRITY_VIOLATION,
            Self::PoolExhausted { .. } => error_code::POOL_EXHAUSTED,
            Self::Released { .. } => error_code::STORAGE_RELEASED,
            Self::LockPoisoned { .. } => error_code::LOCK_POISONED,
        }
    }
}
