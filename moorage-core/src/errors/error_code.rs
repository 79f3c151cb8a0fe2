//! MoorageErrorCode trait for structured error reporting.

/// Every error enum implements this to expose a stable, machine-readable code.
pub trait MoorageErrorCode {
    /// Returns the error code string (e.g., "STORAGE_NOT_FOUND").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const STORAGE_NOT_FOUND: &str = "STORAGE_NOT_FOUND";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const TRANSACTIONS_UNSUPPORTED: &str = "TRANSACTIONS_UNSUPPORTED";
pub const ALREADY_CONFIGURED: &str = "ALREADY_CONFIGURED";
pub const INTEGRITY_VIOLATION: &str = "INTEGRITY_VIOLATION";
pub const POOL_EXHAUSTED: &str = "POOL_EXHAUSTED";
pub const STORAGE_RELEASED: &str = "STORAGE_RELEASED";
pub const LOCK_POISONED: &str = "LOCK_POISONED";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
