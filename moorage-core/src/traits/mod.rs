//! Capability traits implemented by storage backends and consumed by the pool.

pub mod factory;
pub mod storage;
pub mod transaction;

pub use factory::StorageFactory;
pub use storage::{current_transaction, Storage, Transactional};
pub use transaction::{BasicTransaction, Transaction, TransactionStatus};
