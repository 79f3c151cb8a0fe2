//! Pools of interchangeable storage handles and the decorator that returns
//! a borrowed handle on drop.

pub mod decorator;
pub mod storage_pool;

use std::sync::Arc;

use moorage_core::errors::StorageError;
use moorage_core::traits::Storage;

pub use decorator::StorageDecorator;
pub use storage_pool::{PoolStats, StoragePool};

/// The pool capability consumed by the registry and by decorators.
pub trait Pool: Send + Sync {
    /// Registry name of the handles this pool produces.
    fn storage_name(&self) -> &str;

    /// Take a handle out of the pool, creating one if allowed. May block.
    fn acquire(&self) -> Result<Box<dyn Storage>, StorageError>;

    /// Put a handle back for reuse.
    fn release(&self, storage: Box<dyn Storage>);
}

/// Acquire a handle from `pool` and wrap it so it returns itself on drop.
pub fn borrow(pool: &Arc<dyn Pool>) -> Result<Arc<StorageDecorator>, StorageError> {
    let storage = pool.acquire()?;
    Ok(Arc::new(StorageDecorator::new(storage, Arc::downgrade(pool))))
}
