//! Event payloads emitted by pools and scopes.

/// A handle left a pool for a borrower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowEvent {
    pub storage_name: String,
    /// `true` if an idle handle was reused, `false` if one was created.
    pub reused: bool,
}

/// A handle went back into its pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnEvent {
    pub storage_name: String,
}

/// The pool created a new physical handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildEvent {
    pub storage_name: String,
    pub total: usize,
}

/// A scope held a handle back because its transaction was still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkedEvent {
    pub storage_name: String,
}

/// A scope forced a rollback on a handle released mid-transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyRollbackEvent {
    pub storage_name: String,
    pub storage_type: String,
}
