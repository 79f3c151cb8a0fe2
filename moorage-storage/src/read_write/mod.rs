//! Read/write splitting over a reader and a writer connection.

pub mod classify;
pub mod router;

pub use classify::is_read_statement;
pub use router::{ReadWriteStorage, Role};
