//! The storage handle capability set.

use std::sync::Arc;

use crate::errors::StorageError;
use crate::types::{QueryContext, QueryResult, SqlValue};

use super::transaction::Transaction;

/// A live storage connection.
///
/// Every method takes `&self`: handles are shared between a borrower and the
/// decorator that tracks it, so implementations carry their own interior
/// mutability. Backends that can run transactions expose that through
/// [`Storage::as_transactional`].
pub trait Storage: Send + Sync {
    /// The registry name this handle was created for.
    fn storage_name(&self) -> &str;

    /// Concrete type name, used in diagnostics.
    fn storage_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn execute_sql(
        &self,
        sql: &str,
        context: Option<&QueryContext>,
    ) -> Result<QueryResult, StorageError>;

    fn quote(&self, value: &SqlValue) -> Result<String, StorageError>;

    fn escape(&self, value: &str) -> Result<String, StorageError>;

    fn last_insert_id(&self) -> Result<Option<SqlValue>, StorageError>;

    /// Message of the most recent backend failure, if any.
    fn last_error(&self) -> Option<String> {
        None
    }

    fn disconnect(&self) -> Result<(), StorageError>;

    /// `None` when the handle has no transaction capability.
    fn as_transactional(&self) -> Option<&dyn Transactional> {
        None
    }
}

impl std::fmt::Debug for dyn Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("storage_name", &self.storage_name())
            .field("storage_type", &self.storage_type())
            .finish()
    }
}

/// Transaction capability of a storage handle.
pub trait Transactional {
    /// Attach `transaction` to this handle and start it on the backend.
    fn begin_transaction(&self, transaction: Arc<dyn Transaction>) -> Result<(), StorageError>;

    /// The transaction currently attached to this handle.
    fn transaction(&self) -> Option<Arc<dyn Transaction>>;
}

/// The transaction attached to `storage`, if it is transactional and has one.
pub fn current_transaction(storage: &dyn Storage) -> Option<Arc<dyn Transaction>> {
    storage.as_transactional().and_then(|t| t.transaction())
}
