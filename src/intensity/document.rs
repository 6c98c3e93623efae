//! Load point intensity documents:
//! `{ "units": {field: unit}, "sites": [{lon, lat, values: {field: value}}] }`

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::point_index::{IntensitySite, SpatialIntensityIndex};
use crate::core::error::Result;

#[derive(Debug, Deserialize)]
struct IntensityDocument {
    units: BTreeMap<String, String>,
    sites: Vec<IntensitySite>,
}

/// Parse a point intensity document into an index
pub fn parse_intensity_points(
    json: &str,
    neighbors: (usize, usize),
) -> Result<SpatialIntensityIndex> {
    let doc: IntensityDocument = serde_json::from_str(json)?;
    SpatialIntensityIndex::with_neighbor_range(doc.sites, doc.units, neighbors)
}

pub fn load_intensity_points(path: &Path, neighbors: (usize, usize)) -> Result<SpatialIntensityIndex> {
    let content = std::fs::read_to_string(path)?;
    parse_intensity_points(&content, neighbors)
}
