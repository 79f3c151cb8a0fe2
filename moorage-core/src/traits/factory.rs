//! Factories that create physical storage handles.

use crate::errors::StorageError;

use super::storage::Storage;

/// Creates a new storage handle for a registry name.
pub trait StorageFactory: Send + Sync {
    fn create(&self, storage_name: &str) -> Result<Box<dyn Storage>, StorageError>;
}

impl<F> StorageFactory for F
where
    F: Fn(&str) -> Result<Box<dyn Storage>, StorageError> + Send + Sync,
{
    fn create(&self, storage_name: &str) -> Result<Box<dyn Storage>, StorageError> {
        self(storage_name)
    }
}
