//! Row-stochastic conversion matrices between classification schemas.

use std::collections::BTreeMap;

use crate::core::error::{ExposureError, Result};

/// Proportional split of source categories into target categories.
///
/// Every row sums to 1.0 within the tolerance given at construction.
/// Targets within a row are kept in sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionMatrix {
    source_schema: String,
    target_schema: String,
    rows: BTreeMap<String, Vec<(String, f64)>>,
}

impl ConversionMatrix {
    /// Validate and build a matrix
    pub fn new(
        source_schema: impl Into<String>,
        target_schema: impl Into<String>,
        rows: BTreeMap<String, BTreeMap<String, f64>>,
        tolerance: f64,
    ) -> Result<Self> {
        let source_schema = source_schema.into();
        let target_schema = target_schema.into();

        for (key, row) in &rows {
            let sum: f64 = row.values().sum();
            let entries_valid = row.values().all(|p| p.is_finite() && *p >= 0.0);
            if !entries_valid || !((sum - 1.0).abs() <= tolerance) {
                return Err(ExposureError::InvalidConversionMatrix {
                    source_schema,
                    target_schema,
                    key: key.clone(),
                    sum,
                });
            }
        }

        let rows = rows
            .into_iter()
            .map(|(key, row)| (key, row.into_iter().collect()))
            .collect();

        Ok(Self {
            source_schema,
            target_schema,
            rows,
        })
    }

    pub fn source_schema(&self) -> &str {
        &self.source_schema
    }

    pub fn target_schema(&self) -> &str {
        &self.target_schema
    }

    /// Target proportions for a source key
    pub fn row(&self, key: &str) -> Option<&[(String, f64)]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
