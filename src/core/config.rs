//! Run configuration with documented constants
//!
//! Every tunable of an update run lives here. The value is built once by the
//! entry point and passed explicitly to the updater; nothing reads it from a
//! global.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::error::{ExposureError, Result};

/// Configuration for an exposure update run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    // === PARALLELIZATION ===
    /// Process cells on the rayon thread pool
    pub parallel: bool,

    /// Minimum cell count before using parallel processing
    ///
    /// Below this threshold the per-cell work is too small to pay for the
    /// work-stealing overhead.
    pub parallel_threshold: usize,

    // === CONSERVATION ===
    /// Abort when a cell's building total changes during the update
    pub check_conservation: bool,

    /// Relative tolerance for the per-cell building total comparison,
    /// scaled by the cell total (at least 1)
    ///
    /// The waterfall subtracts floating point products from a running
    /// remainder, so totals drift by a few ulps of the cell total per
    /// transition.
    pub conservation_tolerance: f64,

    // === REFERENCE DATA ===
    /// Allowed deviation of a conversion matrix row sum from 1.0
    pub matrix_row_tolerance: f64,

    /// Neighbour ranks (inclusive, 1 = the site itself) used to estimate
    /// the coverage radius of a point intensity index
    ///
    /// The default (2, 4) measures the distance to the 2nd to 4th nearest
    /// site.
    pub coverage_neighbors: (usize, usize),

    // === OUTPUT ===
    /// Currency label attached to every loss value
    pub loss_unit: String,

    /// Intensity field aliases: requested field -> fallback fields in order
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 256,

            check_conservation: true,
            conservation_tolerance: 1e-6,

            matrix_row_tolerance: 1e-3,
            coverage_neighbors: (2, 4),

            loss_unit: "USD".to_string(),
            aliases: BTreeMap::new(),
        }
    }
}

impl UpdateConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: UpdateConfig =
            toml::from_str(content).map_err(|e| ExposureError::Config(e.to_string()))?;
        config.validate().map_err(ExposureError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| ExposureError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.conservation_tolerance.is_nan() || self.conservation_tolerance < 0.0 {
            return Err(format!(
                "conservation_tolerance ({}) must be non-negative",
                self.conservation_tolerance
            ));
        }

        if !(0.0..1.0).contains(&self.matrix_row_tolerance) {
            return Err(format!(
                "matrix_row_tolerance ({}) must be in [0, 1)",
                self.matrix_row_tolerance
            ));
        }

        let (lo, hi) = self.coverage_neighbors;
        if lo < 2 || hi < lo {
            return Err(format!(
                "coverage_neighbors ({}, {}) must satisfy 2 <= first <= second",
                lo, hi
            ));
        }

        for (field, fallbacks) in &self.aliases {
            if fallbacks.is_empty() {
                return Err(format!("alias for {:?} lists no fallback fields", field));
            }
        }

        Ok(())
    }
}
