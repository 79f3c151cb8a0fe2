//! Query results and per-query routing context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sql_value::SqlValue;

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, SqlValue>;

/// The outcome of `Storage::execute_sql`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub affected_rows: u64,
}

impl QueryResult {
    /// A result with no rows and no affected rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_affected(affected_rows: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected_rows,
        }
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            affected_rows: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Caller-supplied hints that travel with a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryContext {
    /// Route this query to the write-capable connection regardless of its text.
    pub use_only_writer: bool,
}

impl QueryContext {
    /// A context that pins the query to the writer.
    pub fn writer_only() -> Self {
        Self {
            use_only_writer: true,
        }
    }
}
