//! Value types shared by storages and their callers.

pub mod collections;
pub mod query;
pub mod sql_value;

pub use query::{QueryContext, QueryResult, Row};
pub use sql_value::SqlValue;
