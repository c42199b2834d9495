//! Configuration for the routing tables.

use axon_types::RoutingError;
use serde::Deserialize;

/// Configuration for table construction and synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// Worker threads (virtual processes) on this rank.
    pub num_threads: usize,

    /// Compaction reallocates a slot to release capacity once more than this
    /// many entries were erased from it.
    pub min_deleted_elements: usize,

    /// Whether synchronization prunes disabled tails of every slot.
    pub remove_disabled_on_sync: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            min_deleted_elements: 1_000_000,
            remove_disabled_on_sync: true,
        }
    }
}

impl RoutingConfig {
    /// Create a config for `num_threads` workers.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    /// Set the compaction shrink threshold.
    pub fn with_min_deleted_elements(mut self, min_deleted_elements: usize) -> Self {
        self.min_deleted_elements = min_deleted_elements;
        self
    }

    /// Enable or disable tail pruning during synchronization.
    pub fn with_remove_disabled_on_sync(mut self, enabled: bool) -> Self {
        self.remove_disabled_on_sync = enabled;
        self
    }

    /// Parse and validate a TOML fragment.
    ///
    /// Missing keys fall back to the defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, RoutingError> {
        let config: Self =
            toml::from_str(input).map_err(|e| RoutingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.num_threads == 0 {
            return Err(RoutingError::InvalidConfig(
                "num_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
