//! Hazard intensity sources.
//!
//! Everything that can answer "what is the hazard intensity here?" implements
//! [`IntensityProvider`]: the point-set index, the raster index, and the
//! composition wrappers that stack, alias and convert fields.

pub mod compose;
pub mod document;
pub mod kdtree;
pub mod point_index;
pub mod raster;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

pub use compose::{AliasIntensityProvider, ConversionIntensityProvider, StackedIntensityProvider};
pub use kdtree::KdTree;
pub use point_index::{IntensitySite, SpatialIntensityIndex};
pub use raster::{Grid, RasterIntensityIndex};

/// Intensity values and their units at one location, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntensitySample {
    values: BTreeMap<String, f64>,
    units: BTreeMap<String, String>,
}

impl IntensitySample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value and unit
    pub fn insert(&mut self, field: impl Into<String>, value: f64, unit: impl Into<String>) {
        let field = field.into();
        self.units.insert(field.clone(), unit.into());
        self.values.insert(field, value);
    }

    pub fn with(mut self, field: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        self.insert(field, value, unit);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn unit(&self, field: &str) -> Option<&str> {
        self.units.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    pub fn units(&self) -> &BTreeMap<String, String> {
        &self.units
    }

    /// Merge `other` into `self`; on a field collision `other` wins
    pub fn overlay(&mut self, other: IntensitySample) {
        self.values.extend(other.values);
        self.units.extend(other.units);
    }
}

/// Capability shared by all intensity sources.
///
/// Implementations must be read-only after construction so one instance can
/// serve every worker thread.
pub trait IntensityProvider: Send + Sync {
    /// Intensity at the sample nearest to `(lon, lat)`
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample;
}

impl<P: IntensityProvider + ?Sized> IntensityProvider for Box<P> {
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample {
        (**self).nearest(lon, lat)
    }
}

impl<P: IntensityProvider + ?Sized> IntensityProvider for Arc<P> {
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample {
        (**self).nearest(lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_last_wins() {
        let mut a = IntensitySample::new().with("PGA", 0.1, "g").with("MWH", 2.0, "m");
        let b = IntensitySample::new().with("PGA", 0.3, "g");

        a.overlay(b);

        assert_eq!(a.value("PGA"), Some(0.3));
        assert_eq!(a.value("MWH"), Some(2.0));
        assert_eq!(a.unit("MWH"), Some("m"));
    }

    #[test]
    fn test_fields_are_sorted() {
        let sample = IntensitySample::new().with("b", 1.0, "u").with("a", 2.0, "u");
        assert_eq!(sample.fields().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
