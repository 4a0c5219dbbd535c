use chg_config::{ChgConfig, DEFAULT_COLLECTION, DEFAULT_CONCURRENT_SAVES, SinkConfig};

use crate::error::SinkError;

/// Options a [`crate::ChangeSink`] is spawned with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    /// Collection (table or file stem) records are written to.
    pub collection: String,
    /// Maximum number of inserts running at the same time.
    pub concurrent_saves: usize,
    /// Bound on queued records; `None` for an unbounded queue.
    pub queue_capacity: Option<usize>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            concurrent_saves: DEFAULT_CONCURRENT_SAVES,
            queue_capacity: None,
        }
    }
}

impl SinkSettings {
    #[must_use]
    pub fn new(collection: impl Into<String>, sink: &SinkConfig) -> Self {
        Self {
            collection: collection.into(),
            concurrent_saves: sink.concurrent_saves,
            queue_capacity: sink.queue_capacity,
        }
    }

    /// Settings from a loaded [`ChgConfig`].
    #[must_use]
    pub fn from_config(config: &ChgConfig) -> Self {
        Self::new(config.store.collection.clone(), &config.sink)
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub const fn with_concurrent_saves(mut self, concurrent_saves: usize) -> Self {
        self.concurrent_saves = concurrent_saves;
        self
    }

    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// # Errors
    ///
    /// Returns `SinkError::Configuration` for an empty collection, a zero
    /// concurrency cap, or a zero queue capacity.
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.collection.trim().is_empty() {
            return Err(SinkError::Configuration(
                "collection name must not be empty".into(),
            ));
        }
        if self.concurrent_saves == 0 {
            return Err(SinkError::Configuration(
                "concurrent_saves must be at least 1".into(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(SinkError::Configuration(
                "queue_capacity must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_config_defaults() {
        let settings = SinkSettings::default();
        assert_eq!(settings, SinkSettings::from_config(&ChgConfig::default()));
        assert_eq!(settings.collection, "changes");
        assert_eq!(settings.concurrent_saves, 10);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let settings = SinkSettings::default().with_concurrent_saves(0);
        assert!(matches!(
            settings.validate(),
            Err(SinkError::Configuration(_))
        ));
    }

    #[test]
    fn empty_collection_is_rejected() {
        let settings = SinkSettings::default().with_collection("");
        assert!(settings.validate().is_err());
    }
}
