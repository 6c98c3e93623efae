//! Load loss reference documents.
//!
//! Each top-level key is a schema holding either explicit matrices
//!
//! ```json
//! { "SARA_v1.0": { "data": [ {"taxonomy": "MUR",
//!                             "loss_matrix": {"D0": {"D1": 120.0}}} ] } }
//! ```
//!
//! or replacement-cost steps
//!
//! ```json
//! { "SUPPASRI2013_v2.0": { "steps": {"D1": 0.625, "D2": 0.75},
//!                          "replacementCosts": {"URM": 800.0},
//!                          "defaultReplacementCost": 500.0 } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::model::{LossMatrix, LossModel, ReplacementCostLoss, SchemaLoss};
use crate::core::error::{ExposureError, Result};
use crate::core::types::{parse_damage_state, DamageState};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SchemaLossDoc {
    Matrix {
        data: Vec<LossMatrixEntry>,
    },
    Steps {
        steps: BTreeMap<String, f64>,
        #[serde(rename = "replacementCosts", default)]
        replacement_costs: BTreeMap<String, f64>,
        #[serde(rename = "defaultReplacementCost", default)]
        default_replacement_cost: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct LossMatrixEntry {
    taxonomy: String,
    loss_matrix: BTreeMap<String, BTreeMap<String, f64>>,
}

fn state(schema: &str, label: &str) -> Result<DamageState> {
    parse_damage_state(label).ok_or_else(|| {
        ExposureError::InvalidReference(format!(
            "loss data for {:?}: bad damage state {:?}",
            schema, label
        ))
    })
}

fn schema_loss(schema: &str, doc: SchemaLossDoc) -> Result<SchemaLoss> {
    match doc {
        SchemaLossDoc::Matrix { data } => {
            let mut matrix = LossMatrix::new();
            for entry in data {
                for (from, row) in &entry.loss_matrix {
                    let from = state(schema, from)?;
                    for (to, loss) in row {
                        matrix.insert(entry.taxonomy.clone(), from, state(schema, to)?, *loss);
                    }
                }
            }
            Ok(SchemaLoss::Matrix(matrix))
        }
        SchemaLossDoc::Steps {
            steps,
            replacement_costs,
            default_replacement_cost,
        } => {
            let steps = steps
                .iter()
                .map(|(label, step)| Ok((state(schema, label)?, *step)))
                .collect::<Result<BTreeMap<_, _>>>()?;
            let mut model = ReplacementCostLoss::new(steps);
            for (taxonomy, cost) in replacement_costs {
                model = model.with_cost(taxonomy, cost);
            }
            if let Some(cost) = default_replacement_cost {
                model = model.with_default_cost(cost);
            }
            Ok(SchemaLoss::ReplacementCost(model))
        }
    }
}

/// Parse a loss document covering one or more schemas
pub fn parse_loss(json: &str) -> Result<LossModel> {
    let docs: BTreeMap<String, SchemaLossDoc> = serde_json::from_str(json)?;
    let mut model = LossModel::new();
    for (schema, doc) in docs {
        let loss = schema_loss(&schema, doc)?;
        model.insert(schema, loss);
    }
    tracing::info!("Loaded loss data for {} schema(s)", model.len());
    Ok(model)
}

pub fn load_loss(path: &Path) -> Result<LossModel> {
    let content = std::fs::read_to_string(path)?;
    parse_loss(&content)
}
