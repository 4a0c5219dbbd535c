//! Sink concurrency and queue configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default cap on concurrently in-flight inserts.
pub const DEFAULT_CONCURRENT_SAVES: usize = 10;

const fn default_concurrent_saves() -> usize {
    DEFAULT_CONCURRENT_SAVES
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Maximum number of inserts running at the same time.
    #[serde(default = "default_concurrent_saves")]
    pub concurrent_saves: usize,

    /// Optional cap on queued records. `None` means unbounded; when set, a
    /// full queue drops new records instead of blocking the caller.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            concurrent_saves: default_concurrent_saves(),
            queue_capacity: None,
        }
    }
}

impl SinkConfig {
    /// Reject values the sink cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero concurrency cap or a zero
    /// queue capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrent_saves == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sink.concurrent_saves".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "sink.queue_capacity".into(),
                reason: "must be at least 1 when set".into(),
            });
        }
        Ok(())
    }
}
