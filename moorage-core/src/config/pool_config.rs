//! Storage pool sizing and timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum number of handles per pool.
pub const DEFAULT_MAX_SIZE: usize = 10;

/// Configuration for a storage pool.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum handles (idle + borrowed). Default: 10.
    pub max_size: Option<usize>,
    /// Handles created up front and kept through idle reaping. Default: 0.
    pub min_size: Option<usize>,
    /// How long `acquire` waits for a free handle. Absent: wait forever.
    pub acquire_timeout_ms: Option<u64>,
    /// Idle handles older than this are reaped down to `min_size`. Absent: never.
    pub idle_timeout_ms: Option<u64>,
}

impl PoolConfig {
    pub fn effective_max_size(&self) -> usize {
        self.max_size.unwrap_or(DEFAULT_MAX_SIZE)
    }

    pub fn effective_min_size(&self) -> usize {
        self.min_size.unwrap_or(0)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}
