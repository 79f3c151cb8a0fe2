//! # moorage-core
//!
//! Foundation crate for the Moorage storage pool.
//! Capability traits, value types, errors, config, events, and tracing setup.
//! Every other crate in the workspace depends on this one.

pub mod config;
pub mod errors;
pub mod events;
pub mod tracing;
pub mod traits;
pub mod types;

pub use config::MoorageConfig;
pub use errors::{ConfigError, MoorageErrorCode, StorageError};
pub use traits::{
    BasicTransaction, Storage, StorageFactory, Transaction, TransactionStatus, Transactional,
};
pub use types::{QueryContext, QueryResult, SqlValue};
