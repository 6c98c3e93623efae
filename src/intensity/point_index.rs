//! Nearest-site intensity lookup over a hazard grid or station network.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Deserialize;

use super::kdtree::KdTree;
use super::{IntensityProvider, IntensitySample};
use crate::core::error::{ExposureError, Result};
use crate::core::types::Coordinate;

/// One sample site with its per-field values
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntensitySite {
    pub lon: f64,
    pub lat: f64,
    pub values: BTreeMap<String, f64>,
}

impl IntensitySite {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }
}

/// Nearest-neighbour intensity index with a coverage radius.
///
/// The coverage radius is the largest distance from any site to its 2nd to
/// 4th nearest site. A query whose nearest site lies farther away than that
/// is outside the hazard footprint: every field reads `0.0`, with units kept.
#[derive(Debug, Clone)]
pub struct SpatialIntensityIndex {
    tree: KdTree,
    values: Vec<BTreeMap<String, f64>>,
    units: BTreeMap<String, String>,
    coverage_radius: f64,
}

impl SpatialIntensityIndex {
    pub fn new(sites: Vec<IntensitySite>, units: BTreeMap<String, String>) -> Result<Self> {
        Self::with_neighbor_range(sites, units, (2, 4))
    }

    /// Build with a custom neighbour rank range (1 = the site itself)
    pub fn with_neighbor_range(
        sites: Vec<IntensitySite>,
        units: BTreeMap<String, String>,
        neighbors: (usize, usize),
    ) -> Result<Self> {
        if sites.is_empty() {
            return Err(ExposureError::EmptySiteSet);
        }
        if neighbors.0 == 0 || neighbors.1 < neighbors.0 {
            return Err(ExposureError::Config(format!(
                "neighbour rank range {:?} must satisfy 1 <= first <= last",
                neighbors
            )));
        }

        for site in &sites {
            if let Some(field) = site.values.keys().find(|f| !units.contains_key(*f)) {
                return Err(ExposureError::InvalidReference(format!(
                    "intensity field {:?} has no unit",
                    field
                )));
            }
        }

        let (points, values): (Vec<[f64; 2]>, Vec<BTreeMap<String, f64>>) = sites
            .into_iter()
            .map(|site| ([site.lon, site.lat], site.values))
            .unzip();
        let tree = KdTree::build(points);
        let coverage_radius = estimate_coverage_radius(&tree, neighbors);

        if coverage_radius == 0.0 {
            tracing::warn!(
                "Intensity index over {} site(s) has zero coverage radius; only exact site hits report intensity",
                tree.len()
            );
        }
        tracing::info!(
            "Built intensity index over {} sites, coverage radius {:.6}",
            tree.len(),
            coverage_radius
        );

        Ok(Self {
            tree,
            values,
            units,
            coverage_radius,
        })
    }

    pub fn coverage_radius(&self) -> f64 {
        self.coverage_radius
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn units(&self) -> &BTreeMap<String, String> {
        &self.units
    }

    fn outside_footprint(&self) -> IntensitySample {
        let mut sample = IntensitySample::new();
        for (field, unit) in &self.units {
            sample.insert(field.clone(), 0.0, unit.clone());
        }
        sample
    }
}

fn estimate_coverage_radius(tree: &KdTree, (first, last): (usize, usize)) -> f64 {
    (0..tree.len())
        .into_par_iter()
        .filter_map(|i| tree.point(i))
        .map(|point| {
            tree.nearest_k(point, last)
                .into_iter()
                .skip(first - 1)
                .map(|(_, d)| d)
                .fold(0.0, f64::max)
        })
        .reduce(|| 0.0, f64::max)
}

impl IntensityProvider for SpatialIntensityIndex {
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample {
        let query = Coordinate::new(lon, lat).as_array();
        let Some((index, distance)) = self.tree.nearest(query) else {
            return self.outside_footprint();
        };
        if distance > self.coverage_radius {
            return self.outside_footprint();
        }

        let mut sample = IntensitySample::new();
        for (field, value) in &self.values[index] {
            if let Some(unit) = self.units.get(field) {
                sample.insert(field.clone(), *value, unit.clone());
            }
        }
        sample
    }
}
