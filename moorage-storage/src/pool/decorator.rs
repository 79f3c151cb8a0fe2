//! StorageDecorator: a borrowed handle that returns itself when dropped.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use moorage_core::errors::StorageError;
use moorage_core::traits::{Storage, Transaction, Transactional};
use moorage_core::types::{QueryContext, QueryResult, SqlValue};

use super::Pool;
use crate::scope::guard;
use crate::scope::{ReturnOutcome, ReturnProxy};

struct DecoratorState {
    storage: Option<Box<dyn Storage>>,
    pool: Option<Weak<dyn Pool>>,
    return_proxy: Option<Weak<dyn ReturnProxy>>,
}

/// Wraps one borrowed handle and forwards every [`Storage`] call to it.
///
/// On disposal (explicit, or when the last `Arc` drops) the decorator asks
/// its return proxy whether the handle may go back to the pool now. If the
/// proxy keeps it, the decorator is done; otherwise the handle is released to
/// the pool. Both back-references are weak: a vanished pool or proxy is
/// treated as absent, never as an error. A decorator is single-use.
pub struct StorageDecorator {
    storage_name: String,
    state: RwLock<DecoratorState>,
}

impl StorageDecorator {
    /// Wrap `storage`, returning it to `pool` on disposal.
    pub fn new(storage: Box<dyn Storage>, pool: Weak<dyn Pool>) -> Self {
        Self::build(storage, Some(pool))
    }

    /// Wrap `storage` with no pool behind it; disposal drops the handle.
    pub fn detached(storage: Box<dyn Storage>) -> Self {
        Self::build(storage, None)
    }

    fn build(storage: Box<dyn Storage>, pool: Option<Weak<dyn Pool>>) -> Self {
        Self {
            storage_name: storage.storage_name().to_string(),
            state: RwLock::new(DecoratorState {
                storage: Some(storage),
                pool,
                return_proxy: None,
            }),
        }
    }

    /// Route this decorator's return through `proxy`. Allowed once.
    pub fn set_return_proxy(&self, proxy: Weak<dyn ReturnProxy>) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::poisoned("storage decorator"))?;
        if state.storage.is_none() {
            return Err(StorageError::Released {
                storage_name: self.storage_name.clone(),
            });
        }
        if state.return_proxy.is_some() {
            return Err(StorageError::AlreadyConfigured {
                what: format!("return proxy of storage {}", self.storage_name),
            });
        }
        state.return_proxy = Some(proxy);
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .storage
            .is_none()
    }

    /// Hand the wrapped handle back. Idempotent.
    ///
    /// All references are cleared before the proxy or pool is called, so a
    /// reentrant disposal finds nothing to do.
    pub fn dispose(&self) {
        let (storage, pool, return_proxy) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let Some(storage) = state.storage.take() else {
                return;
            };
            (storage, state.pool.take(), state.return_proxy.take())
        };

        let storage = match return_proxy.and_then(|proxy| proxy.upgrade()) {
            Some(proxy) => match proxy.return_storage(storage) {
                ReturnOutcome::Release(storage) => storage,
                ReturnOutcome::Retained => return,
            },
            None => {
                // Nobody can hold this handle back any more.
                guard::emergency_abort_if_needed(storage.as_ref());
                storage
            }
        };

        match pool.and_then(|pool| pool.upgrade()) {
            Some(pool) => pool.release(storage),
            None => {
                tracing::debug!(storage_name = %self.storage_name, "no pool to return storage to; dropping it");
            }
        }
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&dyn Storage) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::poisoned("storage decorator"))?;
        match state.storage.as_deref() {
            Some(storage) => f(storage),
            None => Err(StorageError::Released {
                storage_name: self.storage_name.clone(),
            }),
        }
    }
}

impl Storage for StorageDecorator {
    fn storage_name(&self) -> &str {
        &self.storage_name
    }

    fn storage_type(&self) -> &'static str {
        self.with_storage(|storage| Ok(storage.storage_type()))
            .unwrap_or(std::any::type_name::<Self>())
    }

    fn execute_sql(
        &self,
        sql: &str,
        context: Option<&QueryContext>,
    ) -> Result<QueryResult, StorageError> {
        self.with_storage(|storage| storage.execute_sql(sql, context))
    }

    fn quote(&self, value: &SqlValue) -> Result<String, StorageError> {
        self.with_storage(|storage| storage.quote(value))
    }

    fn escape(&self, value: &str) -> Result<String, StorageError> {
        self.with_storage(|storage| storage.escape(value))
    }

    fn last_insert_id(&self) -> Result<Option<SqlValue>, StorageError> {
        self.with_storage(|storage| storage.last_insert_id())
    }

    fn last_error(&self) -> Option<String> {
        self.with_storage(|storage| Ok(storage.last_error()))
            .ok()
            .flatten()
    }

    fn disconnect(&self) -> Result<(), StorageError> {
        self.with_storage(|storage| storage.disconnect())
    }

    fn as_transactional(&self) -> Option<&dyn Transactional> {
        let transactional = self
            .with_storage(|storage| Ok(storage.as_transactional().is_some()))
            .unwrap_or(false);
        if transactional {
            Some(self)
        } else {
            None
        }
    }
}

impl Transactional for StorageDecorator {
    fn begin_transaction(&self, transaction: Arc<dyn Transaction>) -> Result<(), StorageError> {
        self.with_storage(|storage| match storage.as_transactional() {
            Some(transactional) => transactional.begin_transaction(transaction),
            None => Err(StorageError::TransactionsUnsupported {
                storage: storage.storage_type().to_string(),
            }),
        })
    }

    fn transaction(&self) -> Option<Arc<dyn Transaction>> {
        self.with_storage(|storage| {
            Ok(storage
                .as_transactional()
                .and_then(|transactional| transactional.transaction()))
        })
        .ok()
        .flatten()
    }
}

impl Drop for StorageDecorator {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for StorageDecorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageDecorator")
            .field("storage_name", &self.storage_name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
