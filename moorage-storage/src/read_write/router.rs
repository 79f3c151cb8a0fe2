//! ReadWriteStorage: one storage facade over a read replica and a primary.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use moorage_core::errors::StorageError;
use moorage_core::traits::{
    current_transaction, Storage, StorageFactory, Transaction, TransactionStatus, Transactional,
};
use moorage_core::types::{QueryContext, QueryResult, SqlValue};

use super::classify::is_read_statement;

/// Which side of a [`ReadWriteStorage`] served a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Reader,
    Writer,
}

#[derive(Default)]
struct RouterState {
    reader: Option<Arc<dyn Storage>>,
    writer: Option<Arc<dyn Storage>>,
    last_used: Option<Role>,
}

impl RouterState {
    fn slot(&self, role: Role) -> Option<&Arc<dyn Storage>> {
        match role {
            Role::Reader => self.reader.as_ref(),
            Role::Writer => self.writer.as_ref(),
        }
    }

    fn writer_in_transaction(&self) -> bool {
        self.writer
            .as_deref()
            .and_then(|writer| current_transaction(writer))
            .is_some_and(|transaction| transaction.status() == TransactionStatus::Active)
    }

    /// The handle whose dialect applies to quoting: last used, then reader,
    /// then writer.
    fn dialect_storage(&self) -> Option<&Arc<dyn Storage>> {
        self.last_used
            .and_then(|role| self.slot(role))
            .or(self.reader.as_ref())
            .or(self.writer.as_ref())
    }
}

/// Routes each statement to a reader or a writer connection.
///
/// Both connections are created on first use by their factories. A statement
/// goes to the writer when the context asks for the writer only, when it is
/// not a `SELECT`/`WITH`, or while the writer has an active transaction;
/// everything else goes to the reader. Transactions always run on the writer.
pub struct ReadWriteStorage {
    storage_name: String,
    reader_factory: Arc<dyn StorageFactory>,
    writer_factory: Arc<dyn StorageFactory>,
    state: Mutex<RouterState>,
}

impl ReadWriteStorage {
    pub fn new(
        storage_name: impl Into<String>,
        reader_factory: impl StorageFactory + 'static,
        writer_factory: impl StorageFactory + 'static,
    ) -> Self {
        Self {
            storage_name: storage_name.into(),
            reader_factory: Arc::new(reader_factory),
            writer_factory: Arc::new(writer_factory),
            state: Mutex::new(RouterState::default()),
        }
    }

    /// The side that served the most recent statement, if any.
    pub fn last_used(&self) -> Option<Role> {
        self.lock_recovering().last_used
    }

    pub fn routed_to_writer(&self) -> bool {
        self.last_used() == Some(Role::Writer)
    }

    /// Whether the connection for `role` has been created.
    pub fn is_instantiated(&self, role: Role) -> bool {
        self.lock_recovering().slot(role).is_some()
    }

    fn instantiate(
        &self,
        state: &mut RouterState,
        role: Role,
    ) -> Result<Arc<dyn Storage>, StorageError> {
        if let Some(storage) = state.slot(role) {
            return Ok(Arc::clone(storage));
        }
        let factory = match role {
            Role::Reader => &self.reader_factory,
            Role::Writer => &self.writer_factory,
        };
        let storage: Arc<dyn Storage> = Arc::from(factory.create(&self.storage_name)?);
        tracing::debug!(storage_name = %self.storage_name, ?role, "instantiated connection");
        match role {
            Role::Reader => state.reader = Some(Arc::clone(&storage)),
            Role::Writer => state.writer = Some(Arc::clone(&storage)),
        }
        Ok(storage)
    }

    fn dialect_storage(&self) -> Result<Arc<dyn Storage>, StorageError> {
        let mut state = self.lock()?;
        match state.dialect_storage() {
            Some(storage) => Ok(Arc::clone(storage)),
            None => self.instantiate(&mut state, Role::Reader),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RouterState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::poisoned("read/write router"))
    }

    fn lock_recovering(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for ReadWriteStorage {
    fn storage_name(&self) -> &str {
        &self.storage_name
    }

    fn execute_sql(
        &self,
        sql: &str,
        context: Option<&QueryContext>,
    ) -> Result<QueryResult, StorageError> {
        let storage = {
            let mut state = self.lock()?;
            let writer_only = context.is_some_and(|context| context.use_only_writer);
            let role = if writer_only || !is_read_statement(sql) || state.writer_in_transaction() {
                Role::Writer
            } else {
                Role::Reader
            };
            let storage = self.instantiate(&mut state, role)?;
            state.last_used = Some(role);
            tracing::trace!(storage_name = %self.storage_name, ?role, "routing statement");
            storage
        };
        storage.execute_sql(sql, context)
    }

    fn quote(&self, value: &SqlValue) -> Result<String, StorageError> {
        self.dialect_storage()?.quote(value)
    }

    fn escape(&self, value: &str) -> Result<String, StorageError> {
        self.dialect_storage()?.escape(value)
    }

    fn last_insert_id(&self) -> Result<Option<SqlValue>, StorageError> {
        let writer = {
            let mut state = self.lock()?;
            self.instantiate(&mut state, Role::Writer)?
        };
        writer.last_insert_id()
    }

    fn last_error(&self) -> Option<String> {
        let storage = self.lock_recovering().dialect_storage().cloned();
        storage.and_then(|storage| storage.last_error())
    }

    /// Disconnect and drop both connections; the next call recreates them.
    fn disconnect(&self) -> Result<(), StorageError> {
        let (reader, writer) = {
            let mut state = self.lock()?;
            state.last_used = None;
            (state.reader.take(), state.writer.take())
        };
        let mut result = Ok(());
        for storage in [reader, writer].into_iter().flatten() {
            if let Err(err) = storage.disconnect() {
                tracing::warn!(storage_name = %self.storage_name, error = %err, "disconnect failed");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    fn as_transactional(&self) -> Option<&dyn Transactional> {
        Some(self)
    }
}

impl Transactional for ReadWriteStorage {
    fn begin_transaction(&self, transaction: Arc<dyn Transaction>) -> Result<(), StorageError> {
        let writer = {
            let mut state = self.lock()?;
            self.instantiate(&mut state, Role::Writer)?
        };
        match writer.as_transactional() {
            Some(transactional) => transactional.begin_transaction(transaction),
            None => Err(StorageError::TransactionsUnsupported {
                storage: writer.storage_type().to_string(),
            }),
        }
    }

    fn transaction(&self) -> Option<Arc<dyn Transaction>> {
        let writer = self.lock_recovering().writer.clone();
        writer.and_then(|writer| current_transaction(writer.as_ref()))
    }
}

impl std::fmt::Debug for ReadWriteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_recovering();
        f.debug_struct("ReadWriteStorage")
            .field("storage_name", &self.storage_name)
            .field("reader", &state.reader.is_some())
            .field("writer", &state.writer.is_some())
            .field("last_used", &state.last_used)
            .finish()
    }
}
