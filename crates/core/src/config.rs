//! Index configuration
//!
//! [`IndexConfig`] controls how iterators read and how long records stay
//! resident. Build it with the builder methods or parse it from TOML:
//!
//! ```ignore
//! use strata_core::IndexConfig;
//!
//! let config = IndexConfig::new().snapshot_reads(false).retain_capacity(1024);
//! let parsed = IndexConfig::from_toml_str("retain_capacity = 1024")?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Options shared by every index of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Acquire one engine snapshot per iterator when it is opened.
    ///
    /// All reads through that iterator (and its copies) then observe one
    /// point-in-time view, even if writers change the collection.
    pub snapshot_reads: bool,

    /// Number of recently dereferenced records kept alive by the retention
    /// layer. `0` disables retention; records then stay resident only while
    /// some caller holds them.
    pub retain_capacity: usize,

    /// Perform the primary lookup on every secondary dereference, even when
    /// the record is already cached. Detects partition divergence early.
    pub verify_secondary: bool,
}

impl IndexConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable per-iterator snapshots.
    pub fn snapshot_reads(mut self, enabled: bool) -> Self {
        self.snapshot_reads = enabled;
        self
    }

    /// Set the retention capacity.
    pub fn retain_capacity(mut self, capacity: usize) -> Self {
        self.retain_capacity = capacity;
        self
    }

    /// Enable or disable primary verification on secondary cache hits.
    pub fn verify_secondary(mut self, enabled: bool) -> Self {
        self.verify_secondary = enabled;
        self
    }

    /// Parse a config from a TOML document. Missing fields take defaults.
    pub fn from_toml_str(s: &str) -> IndexResult<Self> {
        toml::from_str(s).map_err(|e| IndexError::Config(e.to_string()))
    }

    /// Render the config as TOML.
    pub fn to_toml_string(&self) -> IndexResult<String> {
        toml::to_string(self).map_err(|e| IndexError::Config(e.to_string()))
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_reads: true,
            retain_capacity: 0,
            verify_secondary: true,
        }
    }
}
