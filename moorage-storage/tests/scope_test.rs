//! Tests for per-scope return routing: reuse, parking, and teardown.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use moorage_core::config::RegistryConfig;
use moorage_core::errors::StorageError;
use moorage_core::events::{EmergencyRollbackEvent, EventDispatcher, ParkedEvent, PoolEventHandler};
use moorage_core::traits::{Storage, Transaction, TransactionStatus};
use moorage_storage::StorageRegistry;

use common::{begin, handle_id, MockFactory, RecordingPool};

fn setup(transactional: bool) -> (Arc<StorageRegistry>, Arc<RecordingPool>) {
    let registry = Arc::new(StorageRegistry::new());
    let pool = RecordingPool::new("main", transactional);
    registry.add_pool("main", pool.clone()).unwrap();
    (registry, pool)
}

fn same(a: &Arc<dyn Storage>, b: &Arc<dyn Storage>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[test]
fn test_repeated_lookups_share_one_decorator() {
    let (registry, pool) = setup(false);
    let scope = registry.open_scope();

    let first = scope.find_storage(Some("main")).unwrap().unwrap();
    let second = scope.find_storage(Some("main")).unwrap().unwrap();
    let unnamed = scope.find_storage(None).unwrap().unwrap();

    assert!(same(&first, &second));
    assert!(same(&first, &unnamed));
    assert_eq!(pool.acquired(), 1);
    assert_eq!(scope.live_count(), 1);
}

#[test]
fn test_unknown_storage_is_not_found() {
    let (registry, _pool) = setup(false);
    let scope = registry.open_scope();

    let err = scope.find_storage(Some("archive")).unwrap_err();
    assert_eq!(
        err,
        StorageError::NotFound {
            storage_name: "archive".into()
        }
    );
}

#[test]
fn test_separate_scopes_borrow_separate_handles() {
    let (registry, pool) = setup(false);
    let first_scope = registry.open_scope();
    let second_scope = registry.open_scope();

    let first = first_scope.find_storage(None).unwrap().unwrap();
    let second = second_scope.find_storage(None).unwrap().unwrap();

    assert_ne!(handle_id(&*first), handle_id(&*second));
    assert_eq!(pool.acquired(), 2);
}

#[test]
fn test_released_handle_goes_straight_back() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();

    let storage = scope.find_storage(None).unwrap().unwrap();
    storage.execute_sql("UPDATE t SET x = 1", None).unwrap();
    drop(storage);

    assert_eq!(pool.released(), vec![1]);
    assert_eq!(scope.parked_count(), 0);

    // The next lookup borrows again and gets the recycled handle.
    let again = scope.find_storage(None).unwrap().unwrap();
    assert_eq!(handle_id(&*again), 1);
    assert_eq!(pool.acquired(), 2);
}

#[test]
fn test_open_transaction_parks_handle() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();

    let storage = scope.find_storage(None).unwrap().unwrap();
    let transaction = begin(&*storage);
    drop(storage);

    assert!(pool.released().is_empty());
    assert!(scope.is_parked("main"));
    assert_eq!(scope.parked_count(), 1);
    assert_eq!(scope.live_count(), 0);
    assert_eq!(transaction.status(), TransactionStatus::Active);
}

#[test]
fn test_parked_handle_resumes_and_returns_after_commit() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();

    let storage = scope.find_storage(None).unwrap().unwrap();
    let transaction = begin(&*storage);
    drop(storage);
    assert!(scope.is_parked("main"));

    let resumed = scope.find_storage(None).unwrap().unwrap();
    assert_eq!(handle_id(&*resumed), 1);
    assert_eq!(pool.acquired(), 1, "a parked handle is reused, not re-borrowed");
    assert!(!scope.is_parked("main"));

    transaction.commit();
    drop(resumed);

    assert_eq!(pool.released(), vec![1]);
    assert_eq!(scope.parked_count(), 0);
}

#[test]
fn test_dispose_rolls_back_and_returns_parked_handles_once() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();

    let storage = scope.find_storage(None).unwrap().unwrap();
    let transaction = begin(&*storage);
    drop(storage);

    scope.dispose();
    scope.dispose();
    drop(scope);

    assert_eq!(pool.released(), vec![1]);
    assert_eq!(transaction.status(), TransactionStatus::RolledBack);
    match transaction.rollback_reason() {
        Some(StorageError::IntegrityViolation {
            storage_name,
            storage_type,
        }) => {
            assert_eq!(storage_name, "main");
            assert!(storage_type.contains("MockStorage"));
        }
        other => panic!("expected an integrity violation, got {other:?}"),
    }
}

#[test]
fn test_dispose_leaves_resolved_transactions_alone() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();

    let storage = scope.find_storage(None).unwrap().unwrap();
    let transaction = begin(&*storage);
    drop(storage);
    transaction.commit();

    drop(scope);
    assert_eq!(transaction.status(), TransactionStatus::Committed);
    assert!(transaction.rollback_reason().is_none());
    assert_eq!(pool.released(), vec![1]);
}

#[test]
fn test_decorator_outliving_its_scope_still_returns() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();
    let storage = scope.find_storage(None).unwrap().unwrap();
    let transaction = begin(&*storage);
    drop(scope);

    assert!(pool.released().is_empty());
    drop(storage);

    assert_eq!(pool.released(), vec![1]);
    assert_eq!(transaction.status(), TransactionStatus::RolledBack);
}

#[test]
fn test_decorator_held_across_dispose_rolls_back_before_return() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();

    let storage = scope.find_storage(None).unwrap().unwrap();
    let transaction = begin(&*storage);
    scope.dispose();
    assert_eq!(scope.live_count(), 0);
    assert!(pool.released().is_empty());

    drop(storage);

    assert_eq!(pool.released(), vec![1]);
    assert_eq!(transaction.status(), TransactionStatus::RolledBack);
    assert!(matches!(
        transaction.rollback_reason(),
        Some(StorageError::IntegrityViolation { .. })
    ));
    assert_eq!(scope.parked_count(), 0);
}

#[test]
fn test_lookup_after_registry_is_gone() {
    let (registry, pool) = setup(true);
    let scope = registry.open_scope();

    let storage = scope.find_storage(None).unwrap().unwrap();
    let _transaction = begin(&*storage);
    drop(storage);
    drop(registry);

    assert!(scope.find_storage(None).unwrap().is_none());
    assert!(scope.is_parked("main"));

    scope.dispose();
    assert_eq!(scope.parked_count(), 0);
    assert!(pool.released().is_empty());
}

#[test]
fn test_single_storages_are_shared_not_tracked() {
    let registry = Arc::new(StorageRegistry::new());
    let factory = MockFactory::new("cache", false);
    registry.register_storage("cache", factory.clone()).unwrap();

    let first_scope = registry.open_scope();
    let second_scope = registry.open_scope();
    let first = first_scope.find_storage(Some("cache")).unwrap().unwrap();
    let second = second_scope.find_storage(Some("cache")).unwrap().unwrap();

    assert!(same(&first, &second));
    assert_eq!(factory.created(), 1);
    assert_eq!(first_scope.live_count(), 0);
}

#[derive(Default)]
struct ScopeEvents {
    parked: AtomicUsize,
    rollbacks: Mutex<Vec<EmergencyRollbackEvent>>,
}

impl PoolEventHandler for ScopeEvents {
    fn on_parked(&self, _event: &ParkedEvent) {
        self.parked.fetch_add(1, Ordering::SeqCst);
    }

    fn on_emergency_rollback(&self, event: &EmergencyRollbackEvent) {
        self.rollbacks.lock().unwrap().push(event.clone());
    }
}

#[test]
fn test_park_and_rollback_are_reported() {
    let handler = Arc::new(ScopeEvents::default());
    let mut events = EventDispatcher::new();
    events.register(handler.clone());

    let registry = Arc::new(StorageRegistry::with_config(
        &RegistryConfig::default(),
        Arc::new(events),
    ));
    let pool = RecordingPool::new("main", true);
    registry.add_pool("main", pool.clone()).unwrap();

    let scope = registry.open_scope();
    let storage = scope.find_storage(None).unwrap().unwrap();
    let _transaction = begin(&*storage);
    drop(storage);
    drop(scope);

    assert_eq!(handler.parked.load(Ordering::SeqCst), 1);
    let rollbacks = handler.rollbacks.lock().unwrap();
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].storage_name, "main");
    assert_eq!(pool.released(), vec![1]);
}
