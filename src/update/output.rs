//! Results of an update cycle and their GeoJSON renderings.

use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};

use crate::core::error::Result;
use crate::exposure::document::{expo_value, exposure_collection};
use crate::exposure::{ExposureCell, TransitionCell};
use crate::loss::CellLoss;

/// Everything one cell produced during an update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Building total entering the waterfall (after schema mapping)
    pub buildings_before: f64,
    pub exposure: ExposureCell,
    pub transitions: TransitionCell,
    pub loss: CellLoss,
}

impl UpdateOutcome {
    /// Join the three results into one view
    pub fn merged(&self) -> MergedCell<'_> {
        MergedCell {
            gid: self.exposure.gid(),
            name: self.exposure.name(),
            exposure: &self.exposure,
            transitions: &self.transitions,
            loss: &self.loss,
        }
    }
}

/// Updated exposure, transitions and loss of one cell, keyed by `gid`
#[derive(Debug, Clone, Copy)]
pub struct MergedCell<'a> {
    pub gid: &'a str,
    pub name: Option<&'a str>,
    pub exposure: &'a ExposureCell,
    pub transitions: &'a TransitionCell,
    pub loss: &'a CellLoss,
}

impl MergedCell<'_> {
    pub fn to_feature(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": self.exposure.geometry(),
            "properties": {
                "gid": self.gid,
                "name": self.name,
                "schema": self.exposure.schema(),
                "expo": expo_value(self.exposure),
                "transitions": transitions_value(self.transitions),
                "loss_value": self.loss.loss_value,
                "loss_unit": self.loss.loss_unit,
            }
        })
    }
}

/// Totals over a whole batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventorySummary {
    pub cells: usize,
    pub buildings_before: f64,
    pub buildings_after: f64,
    pub buildings_moved: f64,
    pub loss_value: f64,
}

impl InventorySummary {
    pub fn from_outcomes(outcomes: &[UpdateOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            summary.cells += 1;
            summary.buildings_before += outcome.buildings_before;
            summary.buildings_after += outcome.exposure.total_buildings();
            summary.buildings_moved += outcome.transitions.total_buildings();
            summary.loss_value += outcome.loss.loss_value;
            summary
        })
    }
}

fn transitions_value(cell: &TransitionCell) -> Value {
    json!(cell
        .transitions()
        .iter()
        .map(|t| json!({
            "taxonomy": t.taxonomy,
            "from_damage_state": t.from_state,
            "to_damage_state": t.to_state,
            "n_buildings": t.buildings,
        }))
        .collect::<Vec<_>>())
}

/// Updated exposure of every cell
pub fn exposure_document(outcomes: &[UpdateOutcome]) -> Value {
    let cells: Vec<ExposureCell> = outcomes.iter().map(|o| o.exposure.clone()).collect();
    exposure_collection(&cells)
}

/// Transitions of every cell
pub fn transitions_document(outcomes: &[UpdateOutcome]) -> Value {
    let features: Vec<Value> = outcomes
        .iter()
        .map(|o| {
            json!({
                "type": "Feature",
                "geometry": o.transitions.geometry(),
                "properties": {
                    "gid": o.transitions.gid(),
                    "name": o.transitions.name(),
                    "transitions": transitions_value(&o.transitions),
                }
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Loss of every cell
pub fn loss_document(outcomes: &[UpdateOutcome]) -> Value {
    let features: Vec<Value> = outcomes
        .iter()
        .map(|o| {
            json!({
                "type": "Feature",
                "geometry": o.exposure.geometry(),
                "properties": {
                    "gid": o.exposure.gid(),
                    "name": o.exposure.name(),
                    "loss_value": o.loss.loss_value,
                    "loss_unit": o.loss.loss_unit,
                }
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Exposure, transitions and loss joined per cell, with the batch summary
pub fn merged_document(outcomes: &[UpdateOutcome]) -> Value {
    let features: Vec<Value> = outcomes.iter().map(|o| o.merged().to_feature()).collect();
    json!({
        "type": "FeatureCollection",
        "summary": InventorySummary::from_outcomes(outcomes),
        "features": features,
    })
}

/// Write a document as pretty-printed JSON
pub fn write_document(path: &Path, document: &Value) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(document)?)?;
    Ok(())
}
