//! Shared fixtures: an in-memory storage that journals its calls, a factory
//! that numbers the handles it builds, and a pool that records releases.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use moorage_core::errors::StorageError;
use moorage_core::traits::{Storage, StorageFactory, Transaction, Transactional};
use moorage_core::types::{QueryContext, QueryResult, SqlValue};
use moorage_storage::Pool;

/// Calls observed across every handle built by one factory, as
/// `"<label>#<id>: <call>"`.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct MockStorage {
    storage_name: String,
    label: String,
    id: usize,
    journal: Journal,
    transactional: bool,
    transaction: Mutex<Option<Arc<dyn Transaction>>>,
    disconnected: AtomicBool,
    fail_next: Mutex<Option<String>>,
    last_error: Mutex<Option<String>>,
}

impl MockStorage {
    pub fn new(storage_name: &str, id: usize, transactional: bool) -> Self {
        Self::with_journal(storage_name, storage_name, id, transactional, Journal::default())
    }

    pub fn with_journal(
        storage_name: &str,
        label: &str,
        id: usize,
        transactional: bool,
        journal: Journal,
    ) -> Self {
        Self {
            storage_name: storage_name.to_string(),
            label: label.to_string(),
            id,
            journal,
            transactional,
            transaction: Mutex::new(None),
            disconnected: AtomicBool::new(false),
            fail_next: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Make the next `execute_sql` fail with `message`.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}#{}: {}", self.label, self.id, call));
    }
}

impl Storage for MockStorage {
    fn storage_name(&self) -> &str {
        &self.storage_name
    }

    fn execute_sql(
        &self,
        sql: &str,
        _context: Option<&QueryContext>,
    ) -> Result<QueryResult, StorageError> {
        self.record(sql.to_string());
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            *self.last_error.lock().unwrap() = Some(message.clone());
            return Err(StorageError::backend(message));
        }
        Ok(QueryResult::with_affected(1))
    }

    fn quote(&self, value: &SqlValue) -> Result<String, StorageError> {
        self.record(format!("quote {value}"));
        Ok(match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Text(text) => format!("'{}'", text.replace('\'', "''")),
            other => other.to_string(),
        })
    }

    fn escape(&self, value: &str) -> Result<String, StorageError> {
        self.record(format!("escape {value}"));
        Ok(value.replace('\'', "''"))
    }

    /// Reports the handle's id so tests can tell handles apart.
    fn last_insert_id(&self) -> Result<Option<SqlValue>, StorageError> {
        Ok(Some(SqlValue::Int(self.id as i64)))
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    fn disconnect(&self) -> Result<(), StorageError> {
        self.record("disconnect".to_string());
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn as_transactional(&self) -> Option<&dyn Transactional> {
        if self.transactional {
            Some(self)
        } else {
            None
        }
    }
}

impl Transactional for MockStorage {
    fn begin_transaction(&self, transaction: Arc<dyn Transaction>) -> Result<(), StorageError> {
        self.record("begin".to_string());
        *self.transaction.lock().unwrap() = Some(transaction);
        Ok(())
    }

    fn transaction(&self) -> Option<Arc<dyn Transaction>> {
        self.transaction.lock().unwrap().clone()
    }
}

/// Builds numbered [`MockStorage`] handles sharing one journal.
#[derive(Clone)]
pub struct MockFactory {
    label: String,
    transactional: bool,
    created: Arc<AtomicUsize>,
    journal: Journal,
}

impl MockFactory {
    pub fn new(label: &str, transactional: bool) -> Self {
        Self {
            label: label.to_string(),
            transactional,
            created: Arc::default(),
            journal: Journal::default(),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

impl StorageFactory for MockFactory {
    fn create(&self, storage_name: &str) -> Result<Box<dyn Storage>, StorageError> {
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockStorage::with_journal(
            storage_name,
            &self.label,
            id,
            self.transactional,
            Arc::clone(&self.journal),
        )))
    }
}

/// The id a [`MockStorage`] reports through `last_insert_id`.
pub fn handle_id(storage: &dyn Storage) -> i64 {
    match storage.last_insert_id() {
        Ok(Some(SqlValue::Int(id))) => id,
        other => panic!("not a mock handle: {other:?}"),
    }
}

/// A minimal [`Pool`] that records the id of every handle released to it.
pub struct RecordingPool {
    storage_name: String,
    factory: MockFactory,
    idle: Mutex<Vec<Box<dyn Storage>>>,
    released: Mutex<Vec<i64>>,
    acquired: AtomicUsize,
}

impl RecordingPool {
    pub fn new(storage_name: &str, transactional: bool) -> Arc<Self> {
        Arc::new(Self {
            storage_name: storage_name.to_string(),
            factory: MockFactory::new(storage_name, transactional),
            idle: Mutex::default(),
            released: Mutex::default(),
            acquired: AtomicUsize::new(0),
        })
    }

    pub fn released(&self) -> Vec<i64> {
        self.released.lock().unwrap().clone()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    pub fn idle_ids(&self) -> Vec<i64> {
        self.idle
            .lock()
            .unwrap()
            .iter()
            .map(|storage| handle_id(storage.as_ref()))
            .collect()
    }

    pub fn created(&self) -> usize {
        self.factory.created()
    }
}

impl Pool for RecordingPool {
    fn storage_name(&self) -> &str {
        &self.storage_name
    }

    fn acquire(&self) -> Result<Box<dyn Storage>, StorageError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let idle = self.idle.lock().unwrap().pop();
        match idle {
            Some(storage) => Ok(storage),
            None => self.factory.create(&self.storage_name),
        }
    }

    fn release(&self, storage: Box<dyn Storage>) {
        self.released.lock().unwrap().push(handle_id(storage.as_ref()));
        self.idle.lock().unwrap().push(storage);
    }
}

/// Begin a fresh transaction on `storage`, returning it for later resolution.
pub fn begin(storage: &dyn Storage) -> Arc<moorage_core::traits::BasicTransaction> {
    let transaction = Arc::new(moorage_core::traits::BasicTransaction::new());
    storage
        .as_transactional()
        .expect("storage is transactional")
        .begin_transaction(transaction.clone())
        .unwrap();
    transaction
}
