//! StoragePool: bounded LIFO stack of idle handles built by a factory.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use moorage_core::config::PoolConfig;
use moorage_core::errors::StorageError;
use moorage_core::events::{BorrowEvent, EventDispatcher, RebuildEvent, ReturnEvent};
use moorage_core::traits::{Storage, StorageFactory};

use super::Pool;

/// Point-in-time pool occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Handles sitting idle in the pool.
    pub idle: usize,
    /// Handles currently borrowed.
    pub active: usize,
    /// Total handles (idle + active).
    pub total: usize,
}

struct IdleStorage {
    storage: Box<dyn Storage>,
    idle_since: Instant,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<IdleStorage>,
    total: usize,
}

/// A pool of handles for one storage name.
///
/// The pool is the only component that creates or destroys physical handles.
/// `acquire` reuses the most recently returned handle, creates a new one while
/// under `max_size`, and otherwise waits for a release (up to the acquire
/// timeout, if one is configured).
pub struct StoragePool {
    storage_name: String,
    factory: Arc<dyn StorageFactory>,
    max_size: usize,
    min_size: usize,
    acquire_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    state: Mutex<PoolState>,
    available: Condvar,
    events: Arc<EventDispatcher>,
}

impl StoragePool {
    /// Create a pool and pre-warm it with `min_size` handles.
    pub fn new<F>(
        storage_name: impl Into<String>,
        factory: F,
        config: &PoolConfig,
    ) -> Result<Self, StorageError>
    where
        F: StorageFactory + 'static,
    {
        Self::with_events(storage_name, factory, config, Arc::new(EventDispatcher::new()))
    }

    /// Like [`StoragePool::new`], reporting telemetry to `events`.
    pub fn with_events<F>(
        storage_name: impl Into<String>,
        factory: F,
        config: &PoolConfig,
        events: Arc<EventDispatcher>,
    ) -> Result<Self, StorageError>
    where
        F: StorageFactory + 'static,
    {
        let max_size = config.effective_max_size().max(1);
        let pool = Self {
            storage_name: storage_name.into(),
            factory: Arc::new(factory),
            max_size,
            min_size: config.effective_min_size().min(max_size),
            acquire_timeout: config.acquire_timeout(),
            idle_timeout: config.idle_timeout(),
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            events,
        };
        pool.warm_up()?;
        Ok(pool)
    }

    fn warm_up(&self) -> Result<(), StorageError> {
        for warmed in 1..=self.min_size {
            let storage = self.create_storage(warmed)?;
            let mut state = self.lock()?;
            state.total += 1;
            state.idle.push(IdleStorage {
                storage,
                idle_since: Instant::now(),
            });
        }
        tracing::debug!(storage_name = %self.storage_name, warm = self.min_size, "pool warmed up");
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock_recovering();
        PoolStats {
            idle: state.idle.len(),
            active: state.total - state.idle.len(),
            total: state.total,
        }
    }

    /// Destroy idle handles that outlived the idle timeout, keeping `min_size`.
    /// Returns the number of handles destroyed.
    pub fn reap_idle(&self) -> usize {
        let Some(idle_timeout) = self.idle_timeout else {
            return 0;
        };
        let expired = {
            let mut state = self.lock_recovering();
            let mut expired = Vec::new();
            let mut index = 0;
            while index < state.idle.len() && state.total > self.min_size {
                if state.idle[index].idle_since.elapsed() >= idle_timeout {
                    expired.push(state.idle.remove(index));
                    state.total -= 1;
                } else {
                    index += 1;
                }
            }
            expired
        };
        let reaped = expired.len();
        for idle in expired {
            self.destroy(idle.storage);
        }
        if reaped > 0 {
            tracing::debug!(storage_name = %self.storage_name, reaped, "reaped idle storages");
        }
        reaped
    }

    fn create_storage(&self, total: usize) -> Result<Box<dyn Storage>, StorageError> {
        let storage = self.factory.create(&self.storage_name)?;
        self.events.emit_rebuild(&RebuildEvent {
            storage_name: self.storage_name.clone(),
            total,
        });
        Ok(storage)
    }

    fn destroy(&self, storage: Box<dyn Storage>) {
        if let Err(err) = storage.disconnect() {
            tracing::warn!(storage_name = %self.storage_name, error = %err, "disconnect failed while destroying storage");
        }
    }

    fn is_expired(&self, idle: &IdleStorage) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| idle.idle_since.elapsed() >= timeout)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::poisoned("storage pool"))
    }

    fn lock_recovering(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Pool for StoragePool {
    fn storage_name(&self) -> &str {
        &self.storage_name
    }

    fn acquire(&self) -> Result<Box<dyn Storage>, StorageError> {
        let started = Instant::now();
        let mut state = self.lock()?;
        loop {
            let popped = state.idle.pop();
            if let Some(idle) = popped {
                if self.is_expired(&idle) && state.total > self.min_size {
                    state.total -= 1;
                    drop(state);
                    self.destroy(idle.storage);
                    state = self.lock()?;
                    continue;
                }
                drop(state);
                tracing::trace!(storage_name = %self.storage_name, "reusing idle storage");
                self.events.emit_borrow(&BorrowEvent {
                    storage_name: self.storage_name.clone(),
                    reused: true,
                });
                return Ok(idle.storage);
            }

            if state.total < self.max_size {
                state.total += 1;
                let total = state.total;
                drop(state);
                return match self.create_storage(total) {
                    Ok(storage) => {
                        tracing::debug!(storage_name = %self.storage_name, "created storage");
                        self.events.emit_borrow(&BorrowEvent {
                            storage_name: self.storage_name.clone(),
                            reused: false,
                        });
                        Ok(storage)
                    }
                    Err(err) => {
                        self.lock_recovering().total -= 1;
                        self.available.notify_one();
                        Err(err)
                    }
                };
            }

            state = match self.acquire_timeout {
                None => self
                    .available
                    .wait(state)
                    .map_err(|_| StorageError::poisoned("storage pool"))?,
                Some(timeout) => {
                    let elapsed = started.elapsed();
                    if elapsed >= timeout {
                        tracing::warn!(
                            storage_name = %self.storage_name,
                            max_size = self.max_size,
                            "storage pool exhausted"
                        );
                        return Err(StorageError::PoolExhausted {
                            storage_name: self.storage_name.clone(),
                            waited_ms: elapsed.as_millis() as u64,
                        });
                    }
                    self.available
                        .wait_timeout(state, timeout - elapsed)
                        .map_err(|_| StorageError::poisoned("storage pool"))?
                        .0
                }
            };
        }
    }

    fn release(&self, storage: Box<dyn Storage>) {
        {
            let mut state = self.lock_recovering();
            state.idle.push(IdleStorage {
                storage,
                idle_since: Instant::now(),
            });
        }
        self.available.notify_one();
        tracing::trace!(storage_name = %self.storage_name, "storage returned to pool");
        self.events.emit_return(&ReturnEvent {
            storage_name: self.storage_name.clone(),
        });
    }
}

impl std::fmt::Debug for StoragePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePool")
            .field("storage_name", &self.storage_name)
            .field("max_size", &self.max_size)
            .field("min_size", &self.min_size)
            .field("stats", &self.stats())
            .finish()
    }
}
