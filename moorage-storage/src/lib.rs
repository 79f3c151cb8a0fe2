//! # moorage-storage
//!
//! Borrowing storage handles without an explicit return call.
//!
//! A [`StorageRegistry`] maps names to single storages or to [`Pool`]s.
//! Callers open a [`StorageScope`] per request and look storages up through
//! it; pooled handles come back wrapped in a [`StorageDecorator`] that hands
//! the handle back when the last reference drops. The scope holds back
//! ("parks") any handle whose transaction is still open and force-rolls it
//! back if the scope ends first. [`ReadWriteStorage`] splits queries between
//! a reader and a writer connection.

pub mod pool;
pub mod read_write;
pub mod registry;
pub mod scope;

pub use pool::{borrow, Pool, PoolStats, StorageDecorator, StoragePool};
pub use read_write::{is_read_statement, ReadWriteStorage, Role};
pub use registry::{Borrowed, StorageRegistry};
pub use scope::{ReturnOutcome, ReturnProxy, StorageScope};
