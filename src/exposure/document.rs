//! Read and write exposure inventories as GeoJSON-like feature collections.
//!
//! Two property layouts are understood:
//! - structured: `expo` holds parallel arrays (`Taxonomy`, `Damage`,
//!   `Buildings`, optional `Region`, `Dwellings`, `ReplacementCost`,
//!   `Population`, `name`, `id`)
//! - flat: numeric properties keyed `"<taxonomy>_D<n>"`, or a bare
//!   `"<taxonomy>"` for undamaged buildings

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::bag::{BagMetadata, TaxonomyDamageBag};
use super::cell::ExposureCell;
use super::geometry::CellGeometry;
use crate::core::error::{ExposureError, Result};
use crate::core::types::{format_damage_state, parse_damage_state, DamageState};

/// Properties that never hold building counts in the flat layout
const RESERVED_PROPERTIES: &[&str] = &["gid", "name", "schema", "expo", "id"];

#[derive(Debug, Deserialize)]
struct FeatureCollectionDoc {
    #[serde(default)]
    schema: Option<String>,
    features: Vec<FeatureDoc>,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    id: Option<Value>,
    geometry: CellGeometry,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StructuredExpo {
    taxonomy: Vec<String>,
    damage: Vec<String>,
    buildings: Vec<Option<f64>>,
    #[serde(default)]
    region: Option<Vec<Option<String>>>,
    #[serde(default)]
    dwellings: Option<Vec<Option<f64>>>,
    #[serde(default, alias = "Repl_cost")]
    replacement_cost: Option<Vec<Option<f64>>>,
    #[serde(default)]
    population: Option<Vec<Option<f64>>>,
    #[serde(default, rename = "name")]
    name: Option<Vec<Option<String>>>,
    #[serde(default, rename = "id")]
    id: Option<Vec<Option<Value>>>,
}

/// Parse an exposure feature collection from JSON text
pub fn parse_exposure(json: &str) -> Result<Vec<ExposureCell>> {
    parse_exposure_with_schema(json, None)
}

/// Parse an exposure collection, using `fallback_schema` for cells whose
/// feature and collection both omit a schema
pub fn parse_exposure_with_schema(
    json: &str,
    fallback_schema: Option<&str>,
) -> Result<Vec<ExposureCell>> {
    let doc: FeatureCollectionDoc = serde_json::from_str(json)?;
    let default_schema = doc.schema.as_deref().or(fallback_schema);
    let mut cells = Vec::with_capacity(doc.features.len());

    for (i, feature) in doc.features.into_iter().enumerate() {
        cells.push(parse_feature(i, feature, default_schema)?);
    }

    tracing::debug!("Parsed {} exposure cells", cells.len());
    Ok(cells)
}

/// Load an exposure feature collection from disk
pub fn load_exposure(path: &Path, fallback_schema: Option<&str>) -> Result<Vec<ExposureCell>> {
    let content = std::fs::read_to_string(path)?;
    parse_exposure_with_schema(&content, fallback_schema)
}

fn parse_feature(
    index: usize,
    feature: FeatureDoc,
    default_schema: Option<&str>,
) -> Result<ExposureCell> {
    let props = &feature.properties;
    let gid = props
        .get("gid")
        .or(feature.id.as_ref())
        .map(value_to_label)
        .unwrap_or_else(|| index.to_string());
    let name = props.get("name").and_then(Value::as_str).map(str::to_string);
    let schema = props
        .get("schema")
        .and_then(Value::as_str)
        .or(default_schema)
        .ok_or_else(|| {
            ExposureError::InvalidReference(format!("exposure cell {:?} has no schema", gid))
        })?
        .to_string();

    let bags = match props.get("expo") {
        Some(expo) => structured_bags(&gid, &schema, expo)?,
        None => flat_bags(&schema, props),
    };

    Ok(ExposureCell::new(gid, name, feature.geometry, schema, bags))
}

fn structured_bags(gid: &str, schema: &str, expo: &Value) -> Result<Vec<TaxonomyDamageBag>> {
    let expo = StructuredExpo::deserialize(expo)?;
    let n = expo.taxonomy.len();
    if expo.damage.len() != n || expo.buildings.len() != n {
        return Err(ExposureError::InvalidReference(format!(
            "exposure cell {:?}: Taxonomy, Damage and Buildings lengths differ ({}, {}, {})",
            gid,
            n,
            expo.damage.len(),
            expo.buildings.len()
        )));
    }

    let mut bags = Vec::with_capacity(n);
    for i in 0..n {
        let damage_state = parse_damage_state(&expo.damage[i]).ok_or_else(|| {
            ExposureError::InvalidReference(format!(
                "exposure cell {:?}: bad damage state {:?}",
                gid, expo.damage[i]
            ))
        })?;
        let metadata = BagMetadata {
            region: column(&expo.region, i).cloned(),
            dwellings: column(&expo.dwellings, i).copied(),
            replacement_cost_per_building: column(&expo.replacement_cost, i).copied(),
            population: column(&expo.population, i).copied(),
            area_id: column(&expo.id, i).map(value_to_label),
            name: column(&expo.name, i).cloned(),
        };
        let buildings = expo.buildings[i].unwrap_or(f64::NAN);
        bags.push(
            TaxonomyDamageBag::new(schema, expo.taxonomy[i].clone(), damage_state, buildings)
                .with_metadata(metadata),
        );
    }
    Ok(bags)
}

fn column<T>(values: &Option<Vec<Option<T>>>, i: usize) -> Option<&T> {
    values.as_ref().and_then(|v| v.get(i)).and_then(Option::as_ref)
}

fn flat_bags(schema: &str, props: &Map<String, Value>) -> Vec<TaxonomyDamageBag> {
    props
        .iter()
        .filter(|(key, _)| !RESERVED_PROPERTIES.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let count = value.as_f64()?;
            let (taxonomy, damage_state) = split_flat_key(key);
            Some(TaxonomyDamageBag::new(schema, taxonomy, damage_state, count))
        })
        .collect()
}

/// Split `"<taxonomy>_D<n>"` into its parts; anything else is state 0
pub fn split_flat_key(key: &str) -> (&str, DamageState) {
    if let Some((taxonomy, suffix)) = key.rsplit_once('_') {
        if suffix.starts_with('D') && !taxonomy.is_empty() {
            if let Some(state) = parse_damage_state(suffix) {
                return (taxonomy, state);
            }
        }
    }
    (key, 0)
}

fn value_to_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Structured `expo` object for a cell, the inverse of [`parse_exposure`]
pub fn expo_value(cell: &ExposureCell) -> Value {
    let bags = cell.bags();
    let mut expo = Map::new();
    expo.insert(
        "Taxonomy".into(),
        bags.iter().map(|b| json!(b.taxonomy)).collect(),
    );
    expo.insert(
        "Damage".into(),
        bags.iter()
            .map(|b| json!(format_damage_state(b.damage_state)))
            .collect(),
    );
    expo.insert(
        "Buildings".into(),
        bags.iter().map(|b| json!(b.buildings)).collect(),
    );

    let optional: [(&str, fn(&BagMetadata) -> Value); 6] = [
        ("Region", |m| json!(m.region)),
        ("Dwellings", |m| json!(m.dwellings)),
        ("ReplacementCost", |m| json!(m.replacement_cost_per_building)),
        ("Population", |m| json!(m.population)),
        ("name", |m| json!(m.name)),
        ("id", |m| json!(m.area_id)),
    ];
    for (key, extract) in optional {
        let values: Vec<Value> = bags.iter().map(|b| extract(&b.metadata)).collect();
        if values.iter().any(|v| !v.is_null()) {
            expo.insert(key.into(), Value::Array(values));
        }
    }
    Value::Object(expo)
}

/// A cell as a GeoJSON feature in the structured layout
pub fn exposure_feature(cell: &ExposureCell) -> Value {
    json!({
        "type": "Feature",
        "geometry": cell.geometry(),
        "properties": {
            "gid": cell.gid(),
            "name": cell.name(),
            "schema": cell.schema(),
            "expo": expo_value(cell),
        }
    })
}

/// Cells as a GeoJSON feature collection
pub fn exposure_collection(cells: &[ExposureCell]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": cells.iter().map(exposure_feature).collect::<Vec<_>>(),
    })
}
