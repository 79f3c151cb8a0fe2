//! StorageScope: one request's view of the registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use moorage_core::errors::StorageError;
use moorage_core::events::{EmergencyRollbackEvent, ParkedEvent};
use moorage_core::traits::Storage;
use moorage_core::types::collections::FxHashMap;

use super::{guard, ReturnOutcome, ReturnProxy};
use crate::pool::StorageDecorator;
use crate::registry::{Borrowed, StorageRegistry};

#[derive(Default)]
struct ScopeState {
    /// The decorator currently handed out for each name.
    live: FxHashMap<String, Weak<StorageDecorator>>,
    /// Handles held back from their pool until their transaction resolves.
    parked: FxHashMap<String, Box<dyn Storage>>,
}

/// Tracks the storages borrowed within one logical session or request.
///
/// Repeated lookups of a name return the same decorator while it is alive.
/// When a decorator is dropped with an unresolved transaction its handle is
/// parked here instead of going back to the pool; the next lookup of that
/// name re-wraps the parked handle. Dropping the scope force-rolls back any
/// still-open transaction on parked handles and returns them.
///
/// A scope must stay confined to a single session; it is not meant to be
/// shared between concurrent requests.
pub struct StorageScope {
    registry: Weak<StorageRegistry>,
    self_ref: Weak<StorageScope>,
    default_storage: String,
    state: Mutex<ScopeState>,
}

impl StorageScope {
    pub(crate) fn new(registry: &Arc<StorageRegistry>) -> Arc<Self> {
        let default_storage = registry.default_storage().to_string();
        let registry = Arc::downgrade(registry);
        Arc::new_cyclic(|self_ref| Self {
            registry,
            self_ref: self_ref.clone(),
            default_storage,
            state: Mutex::new(ScopeState::default()),
        })
    }

    /// Look up a storage for this scope, borrowing it if needed.
    ///
    /// `None` for `storage_name` means the registry's default storage.
    /// Returns `Ok(None)` once the registry is gone.
    pub fn find_storage(
        &self,
        storage_name: Option<&str>,
    ) -> Result<Option<Arc<dyn Storage>>, StorageError> {
        let storage_name = storage_name.unwrap_or(&self.default_storage);

        let parked = {
            let mut state = self.lock()?;
            if let Some(live) = state.live.get(storage_name) {
                if let Some(decorator) = live.upgrade() {
                    tracing::trace!(storage_name, "reusing live storage");
                    let storage: Arc<dyn Storage> = decorator;
                    return Ok(Some(storage));
                }
                state.live.remove(storage_name);
            }
            state.parked.remove(storage_name)
        };

        let Some(registry) = self.registry.upgrade() else {
            if let Some(handle) = parked {
                self.lock()?.parked.insert(storage_name.to_string(), handle);
            }
            return Ok(None);
        };

        let storage: Arc<dyn Storage> = match parked {
            Some(handle) => {
                tracing::debug!(storage_name, "resuming parked storage");
                let decorator = registry.create_decorator(storage_name, handle);
                self.adopt(storage_name, &decorator)?;
                decorator
            }
            None => match registry.borrow_storage(storage_name)? {
                Borrowed::Decorated(decorator) => {
                    tracing::debug!(storage_name, "borrowed storage");
                    self.adopt(storage_name, &decorator)?;
                    decorator
                }
                Borrowed::Shared(storage) => storage,
            },
        };

        Ok(Some(storage))
    }

    /// Route `decorator`'s return through this scope and remember it.
    fn adopt(&self, storage_name: &str, decorator: &Arc<StorageDecorator>) -> Result<(), StorageError> {
        let proxy: Weak<dyn ReturnProxy> = self.self_ref.clone();
        decorator.set_return_proxy(proxy)?;
        self.lock()?
            .live
            .entry(storage_name.to_string())
            .or_insert_with(|| Arc::downgrade(decorator));
        Ok(())
    }

    /// Release every parked handle and forget all live decorators. Idempotent.
    ///
    /// Parked handles whose transaction is still open are force-rolled back
    /// first. Does nothing with the handles if the registry is already gone.
    /// Decorators still held afterwards return straight to their pool, with
    /// any open transaction rolled back.
    pub fn dispose(&self) {
        let (live, parked) = {
            let mut state = self.lock_recovering();
            (
                std::mem::take(&mut state.live),
                std::mem::take(&mut state.parked),
            )
        };
        drop(live);

        if parked.is_empty() {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            tracing::debug!(parked = parked.len(), "registry gone; dropping parked storages");
            return;
        };

        tracing::debug!(parked = parked.len(), "releasing parked storages");
        for (storage_name, handle) in parked {
            release_parked(&registry, &storage_name, handle);
        }
    }

    /// Number of names with a tracked decorator (alive or not yet pruned).
    pub fn live_count(&self) -> usize {
        self.lock_recovering().live.len()
    }

    pub fn parked_count(&self) -> usize {
        self.lock_recovering().parked.len()
    }

    pub fn is_parked(&self, storage_name: &str) -> bool {
        self.lock_recovering().parked.contains_key(storage_name)
    }

    pub fn default_storage(&self) -> &str {
        &self.default_storage
    }

    fn lock(&self) -> Result<MutexGuard<'_, ScopeState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::poisoned("storage scope"))
    }

    fn lock_recovering(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReturnProxy for StorageScope {
    fn return_storage(&self, storage: Box<dyn Storage>) -> ReturnOutcome {
        let storage_name = storage.storage_name().to_string();

        let (outcome, displaced) = {
            let mut state = self.lock_recovering();
            if !state.live.contains_key(&storage_name) && !state.parked.contains_key(&storage_name)
            {
                // Only a disposed scope loses track of its decorators; nothing
                // will come back for this handle.
                drop(state);
                if let Some(registry) = self.registry.upgrade() {
                    abort_if_needed(&registry, &storage_name, storage.as_ref());
                } else {
                    guard::emergency_abort_if_needed(storage.as_ref());
                }
                return ReturnOutcome::Release(storage);
            }
            state.live.remove(&storage_name);

            if guard::is_safe_to_return(storage.as_ref()) {
                let displaced = state.parked.remove(&storage_name);
                (ReturnOutcome::Release(storage), displaced)
            } else {
                let displaced = state.parked.insert(storage_name.clone(), storage);
                (ReturnOutcome::Retained, displaced)
            }
        };

        let registry = self.registry.upgrade();
        if let (Some(registry), Some(handle)) = (registry.as_ref(), displaced) {
            release_parked(registry, &storage_name, handle);
        }

        if !outcome.is_release() {
            tracing::debug!(storage_name = %storage_name, "transaction still open; parking storage");
            if let Some(registry) = registry.as_ref() {
                registry.events().emit_parked(&ParkedEvent { storage_name });
            }
        }

        outcome
    }
}

/// Force-resolve and hand a parked handle back to the registry.
fn release_parked(registry: &StorageRegistry, storage_name: &str, handle: Box<dyn Storage>) {
    abort_if_needed(registry, storage_name, handle.as_ref());
    registry.return_storage(storage_name, handle);
}

fn abort_if_needed(registry: &StorageRegistry, storage_name: &str, storage: &dyn Storage) {
    if guard::emergency_abort_if_needed(storage) {
        registry
            .events()
            .emit_emergency_rollback(&EmergencyRollbackEvent {
                storage_name: storage_name.to_string(),
                storage_type: storage.storage_type().to_string(),
            });
    }
}

impl Drop for StorageScope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for StorageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_recovering();
        f.debug_struct("StorageScope")
            .field("default_storage", &self.default_storage)
            .field("live", &state.live.keys().collect::<Vec<_>>())
            .field("parked", &state.parked.keys().collect::<Vec<_>>())
            .finish()
    }
}
