//! Configuration system for Moorage.
//! TOML-based, layered resolution: overrides > env > project > user > defaults.

pub mod moorage_config;
pub mod pool_config;
pub mod registry_config;

pub use moorage_config::{ConfigOverrides, MoorageConfig};
pub use pool_config::PoolConfig;
pub use registry_config::{RegistryConfig, DEFAULT_STORAGE};
