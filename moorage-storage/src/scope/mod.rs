//! Per-scope return routing for borrowed storages.

pub mod guard;
pub mod storage_scope;

use moorage_core::traits::Storage;

pub use storage_scope::StorageScope;

/// What a [`ReturnProxy`] decided about a handle offered back to it.
pub enum ReturnOutcome {
    /// The caller must release the handle to its pool.
    Release(Box<dyn Storage>),
    /// The proxy kept the handle; the caller does nothing further.
    Retained,
}

impl ReturnOutcome {
    pub fn is_release(&self) -> bool {
        matches!(self, ReturnOutcome::Release(_))
    }
}

impl std::fmt::Debug for ReturnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnOutcome::Release(storage) => {
                f.debug_tuple("Release").field(&storage.storage_name()).finish()
            }
            ReturnOutcome::Retained => f.write_str("Retained"),
        }
    }
}

/// Decides, per handle, whether a disposing decorator may release it.
pub trait ReturnProxy: Send + Sync {
    fn return_storage(&self, storage: Box<dyn Storage>) -> ReturnOutcome;
}
