//! Error handling for Moorage.
//! One error enum per subsystem, `thiserror` only.

pub mod config_error;
pub mod error_code;
pub mod storage_error;

pub use config_error::ConfigError;
pub use error_code::MoorageErrorCode;
pub use storage_error::StorageError;
