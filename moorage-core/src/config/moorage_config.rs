//! Top-level Moorage configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{PoolConfig, RegistryConfig};
use crate::errors::ConfigError;

/// Project config file name, looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = "moorage.toml";

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. Programmatic overrides (applied via `apply_overrides`)
/// 2. Environment variables (`MOORAGE_*`)
/// 3. Project config (`moorage.toml` in project root)
/// 4. User config (`~/.moorage/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct MoorageConfig {
    pub pool: PoolConfig,
    pub registry: RegistryConfig,
}

/// Overrides supplied by the embedding application.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub pool_max_size: Option<usize>,
    pub pool_min_size: Option<usize>,
    pub pool_acquire_timeout_ms: Option<u64>,
    pub pool_idle_timeout_ms: Option<u64>,
    pub default_storage: Option<String>,
}

impl MoorageConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path, overrides: Option<&ConfigOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Lowest priority: user config. Only a parse failure is fatal here.
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(err @ ConfigError::ParseError { .. }) => return Err(err),
                    Err(err) => {
                        tracing::warn!(path = %user_config_path.display(), error = %err, "ignoring user config");
                    }
                }
            }
        }

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config)?;

        if let Some(overrides) = overrides {
            Self::apply_overrides(&mut config, overrides);
        }

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration values.
    pub fn validate(config: &MoorageConfig) -> Result<(), ConfigError> {
        if config.pool.effective_max_size() == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "pool.max_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.pool.effective_min_size() > config.pool.effective_max_size() {
            return Err(ConfigError::ValidationFailed {
                field: "pool.min_size".to_string(),
                message: "must not exceed pool.max_size".to_string(),
            });
        }
        if config.registry.effective_default_storage().trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "registry.default_storage".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }

    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".moorage").join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored.
    fn merge_toml_file(config: &mut MoorageConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: MoorageConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; only `Some` values in `other` win.
    fn merge(base: &mut MoorageConfig, other: &MoorageConfig) {
        if other.pool.max_size.is_some() {
            base.pool.max_size = other.pool.max_size;
        }
        if other.pool.min_size.is_some() {
            base.pool.min_size = other.pool.min_size;
        }
        if other.pool.acquire_timeout_ms.is_some() {
            base.pool.acquire_timeout_ms = other.pool.acquire_timeout_ms;
        }
        if other.pool.idle_timeout_ms.is_some() {
            base.pool.idle_timeout_ms = other.pool.idle_timeout_ms;
        }
        if other.registry.default_storage.is_some() {
            base.registry.default_storage = other.registry.default_storage.clone();
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `MOORAGE_POOL_MAX_SIZE`, `MOORAGE_DEFAULT_STORAGE`, etc.
    fn apply_env_overrides(config: &mut MoorageConfig) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<usize>("MOORAGE_POOL_MAX_SIZE")? {
            config.pool.max_size = Some(v);
        }
        if let Some(v) = env_parse::<usize>("MOORAGE_POOL_MIN_SIZE")? {
            config.pool.min_size = Some(v);
        }
        if let Some(v) = env_parse::<u64>("MOORAGE_POOL_ACQUIRE_TIMEOUT_MS")? {
            config.pool.acquire_timeout_ms = Some(v);
        }
        if let Some(v) = env_parse::<u64>("MOORAGE_POOL_IDLE_TIMEOUT_MS")? {
            config.pool.idle_timeout_ms = Some(v);
        }
        if let Ok(val) = std::env::var("MOORAGE_DEFAULT_STORAGE") {
            config.registry.default_storage = Some(val);
        }
        Ok(())
    }

    fn apply_overrides(config: &mut MoorageConfig, overrides: &ConfigOverrides) {
        if let Some(v) = overrides.pool_max_size {
            config.pool.max_size = Some(v);
        }
        if let Some(v) = overrides.pool_min_size {
            config.pool.min_size = Some(v);
        }
        if let Some(v) = overrides.pool_acquire_timeout_ms {
            config.pool.acquire_timeout_ms = Some(v);
        }
        if let Some(v) = overrides.pool_idle_timeout_ms {
            config.pool.idle_timeout_ms = Some(v);
        }
        if let Some(ref v) = overrides.default_storage {
            config.registry.default_storage = Some(v.clone());
        }
    }
}

/// Parse an env var, rejecting values that are set but malformed.
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                message: format!("cannot parse {val:?}"),
            }),
        Err(_) => Ok(None),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
