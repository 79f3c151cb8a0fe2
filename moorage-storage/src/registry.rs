//! StorageRegistry: the name → storage map behind every scope.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use moorage_core::config::RegistryConfig;
use moorage_core::errors::StorageError;
use moorage_core::events::EventDispatcher;
use moorage_core::traits::{Storage, StorageFactory};
use moorage_core::types::collections::FxHashMap;

use crate::pool::{self, Pool, StorageDecorator};
use crate::scope::StorageScope;

type LazySlot = Arc<Mutex<Option<Arc<dyn Storage>>>>;

enum Registration {
    /// A single storage built on first borrow and cached afterwards.
    Lazy {
        factory: Arc<dyn StorageFactory>,
        slot: LazySlot,
    },
    /// A single storage supplied ready-made.
    Instance(Arc<dyn Storage>),
    Pool(Arc<dyn Pool>),
}

/// What [`StorageRegistry::borrow_storage`] hands out.
pub enum Borrowed {
    /// A pooled handle that returns itself when the decorator is disposed.
    Decorated(Arc<StorageDecorator>),
    /// A single storage shared by every borrower; nothing to return.
    Shared(Arc<dyn Storage>),
}

impl std::fmt::Debug for Borrowed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Borrowed::Decorated(decorator) => f.debug_tuple("Decorated").field(decorator).finish(),
            Borrowed::Shared(storage) => f.debug_tuple("Shared").field(&storage.storage_name()).finish(),
        }
    }
}

impl Borrowed {
    pub fn into_storage(self) -> Arc<dyn Storage> {
        match self {
            Borrowed::Decorated(decorator) => decorator,
            Borrowed::Shared(storage) => storage,
        }
    }

    pub fn is_decorated(&self) -> bool {
        matches!(self, Borrowed::Decorated(_))
    }
}

/// Maps storage names to single storages or pools.
///
/// Registration happens at startup; lookups go through a [`StorageScope`]
/// opened per request with [`StorageRegistry::open_scope`].
pub struct StorageRegistry {
    entries: RwLock<FxHashMap<String, Registration>>,
    default_storage: String,
    events: Arc<EventDispatcher>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default(), Arc::new(EventDispatcher::new()))
    }

    pub fn with_config(config: &RegistryConfig, events: Arc<EventDispatcher>) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            default_storage: config.effective_default_storage().to_string(),
            events,
        }
    }

    /// Register a single storage built lazily by `factory`.
    pub fn register_storage(
        &self,
        storage_name: impl Into<String>,
        factory: impl StorageFactory + 'static,
    ) -> Result<(), StorageError> {
        self.insert(
            storage_name.into(),
            Registration::Lazy {
                factory: Arc::new(factory),
                slot: Arc::new(Mutex::new(None)),
            },
        )
    }

    /// Register an already-built single storage.
    pub fn add_storage(
        &self,
        storage_name: impl Into<String>,
        storage: Arc<dyn Storage>,
    ) -> Result<(), StorageError> {
        self.insert(storage_name.into(), Registration::Instance(storage))
    }

    /// Register a pool; borrows of `storage_name` come back decorated.
    pub fn add_pool(
        &self,
        storage_name: impl Into<String>,
        pool: Arc<dyn Pool>,
    ) -> Result<(), StorageError> {
        self.insert(storage_name.into(), Registration::Pool(pool))
    }

    fn insert(&self, storage_name: String, registration: Registration) -> Result<(), StorageError> {
        let previous = self
            .entries
            .write()
            .map_err(|_| StorageError::poisoned("storage registry"))?
            .insert(storage_name.clone(), registration);
        if previous.is_some() {
            tracing::debug!(storage_name = %storage_name, "replaced storage registration");
        }
        Ok(())
    }

    pub fn contains(&self, storage_name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(storage_name)
    }

    /// Registered names, sorted.
    pub fn storage_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn default_storage(&self) -> &str {
        &self.default_storage
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Borrow the storage registered under `storage_name`.
    ///
    /// Pooled storages may block in [`Pool::acquire`]. Fails with
    /// [`StorageError::NotFound`] for an unknown name.
    pub fn borrow_storage(&self, storage_name: &str) -> Result<Borrowed, StorageError> {
        enum Source {
            Lazy(Arc<dyn StorageFactory>, LazySlot),
            Instance(Arc<dyn Storage>),
            Pool(Arc<dyn Pool>),
        }

        // Clone out of the map so no registry lock is held while the pool
        // or factory runs.
        let source = {
            let entries = self
                .entries
                .read()
                .map_err(|_| StorageError::poisoned("storage registry"))?;
            match entries.get(storage_name) {
                Some(Registration::Lazy { factory, slot }) => {
                    Source::Lazy(Arc::clone(factory), Arc::clone(slot))
                }
                Some(Registration::Instance(storage)) => Source::Instance(Arc::clone(storage)),
                Some(Registration::Pool(pool)) => Source::Pool(Arc::clone(pool)),
                None => {
                    return Err(StorageError::NotFound {
                        storage_name: storage_name.to_string(),
                    })
                }
            }
        };

        match source {
            Source::Pool(pool) => pool::borrow(&pool).map(Borrowed::Decorated),
            Source::Instance(storage) => Ok(Borrowed::Shared(storage)),
            Source::Lazy(factory, slot) => {
                let mut slot = slot
                    .lock()
                    .map_err(|_| StorageError::poisoned("lazy storage"))?;
                if let Some(storage) = slot.as_ref() {
                    return Ok(Borrowed::Shared(Arc::clone(storage)));
                }
                let storage: Arc<dyn Storage> = Arc::from(factory.create(storage_name)?);
                tracing::debug!(storage_name, "instantiated lazy storage");
                *slot = Some(Arc::clone(&storage));
                Ok(Borrowed::Shared(storage))
            }
        }
    }

    /// Hand `storage` back to the pool registered under `storage_name`.
    ///
    /// Handles of non-pooled or unknown names are disconnected and dropped.
    pub fn return_storage(&self, storage_name: &str, storage: Box<dyn Storage>) {
        match self.pool(storage_name) {
            Some(pool) => pool.release(storage),
            None => {
                tracing::debug!(storage_name, "no pool registered; dropping returned storage");
                if let Err(err) = storage.disconnect() {
                    tracing::warn!(storage_name, error = %err, "disconnect failed for returned storage");
                }
            }
        }
    }

    /// Wrap a handle that is already out of its pool, e.g. one a scope parked.
    pub fn create_decorator(
        &self,
        storage_name: &str,
        storage: Box<dyn Storage>,
    ) -> Arc<StorageDecorator> {
        let decorator = match self.pool(storage_name) {
            Some(pool) => StorageDecorator::new(storage, Arc::downgrade(&pool)),
            None => StorageDecorator::detached(storage),
        };
        Arc::new(decorator)
    }

    fn pool(&self, storage_name: &str) -> Option<Arc<dyn Pool>> {
        match self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(storage_name)
        {
            Some(Registration::Pool(pool)) => Some(Arc::clone(pool)),
            _ => None,
        }
    }

    /// Open a scope that tracks borrows for one request.
    pub fn open_scope(self: &Arc<Self>) -> Arc<StorageScope> {
        StorageScope::new(self)
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("storages", &self.storage_names())
            .field("default_storage", &self.default_storage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moorage_core::config::DEFAULT_STORAGE;

    #[test]
    fn default_storage_comes_from_config() {
        let registry = StorageRegistry::new();
        assert_eq!(registry.default_storage(), DEFAULT_STORAGE);

        let config = RegistryConfig {
            default_storage: Some("replica".to_string()),
        };
        let registry = StorageRegistry::with_config(&config, Arc::new(EventDispatcher::new()));
        assert_eq!(registry.default_storage(), "replica");
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = StorageRegistry::new();
        let err = registry.borrow_storage("missing").unwrap_err();
        assert_eq!(
            err,
            StorageError::NotFound {
                storage_name: "missing".to_string()
            }
        );
    }
}
