//! Load fragility reference documents.
//!
//! ```json
//! { "meta": {"id": "SARA_v1.0", "shape": "logncdf"},
//!   "data": [ {"taxonomy": "MUR", "imt": "PGA", "imu": "g",
//!              "D1_mean": -1.4, "D1_stddev": 0.6,
//!              "D_1_3_mean": -0.5, "D_1_3_stddev": 0.6} ] }
//! ```
//!
//! `D<n>` names a transition from state 0; `D_<a>_<b>` names both ends.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::function::{FragilityCurve, FragilityFunction};
use super::model::FragilityModel;
use crate::core::error::{ExposureError, Result};
use crate::core::types::{parse_damage_state, DamageState};

#[derive(Debug, Deserialize)]
struct FragilityDocument {
    meta: FragilityMeta,
    data: Vec<FragilityEntry>,
}

#[derive(Debug, Deserialize)]
struct FragilityMeta {
    id: String,
    #[serde(default = "default_shape")]
    shape: String,
}

fn default_shape() -> String {
    "logncdf".to_string()
}

#[derive(Debug, Deserialize)]
struct FragilityEntry {
    taxonomy: String,
    imt: String,
    imu: String,
    #[serde(flatten)]
    parameters: Map<String, Value>,
}

/// Curve shapes a document may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    LogNormal,
    Constant,
}

impl Shape {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "logncdf" | "lognormal" => Ok(Shape::LogNormal),
            "constant" => Ok(Shape::Constant),
            other => Err(ExposureError::InvalidReference(format!(
                "unsupported fragility shape {:?}",
                other
            ))),
        }
    }

    /// Parameter suffix that marks one transition
    fn marker(self) -> &'static str {
        match self {
            Shape::LogNormal => "_mean",
            Shape::Constant => "_probability",
        }
    }
}

/// Parse a transition label: `D3` is 0 -> 3, `D_1_3` is 1 -> 3
pub fn parse_transition_label(label: &str) -> Option<(DamageState, DamageState)> {
    if let Some(rest) = label.strip_prefix("D_") {
        let (from, to) = rest.split_once('_')?;
        return Some((parse_damage_state(from)?, parse_damage_state(to)?));
    }
    if label.starts_with('D') {
        return Some((0, parse_damage_state(label)?));
    }
    None
}

/// Parse a fragility document into a model
pub fn parse_fragility(json: &str) -> Result<FragilityModel> {
    let doc: FragilityDocument = serde_json::from_str(json)?;
    let shape = Shape::parse(&doc.meta.shape)?;
    let mut model = FragilityModel::new(doc.meta.id);

    for entry in &doc.data {
        for function in entry_functions(entry, shape)? {
            model.insert(function);
        }
    }

    tracing::info!(
        "Loaded fragility schema {} with {} functions for {} taxonomies",
        model.schema(),
        model.function_count(),
        model.taxonomies().len()
    );
    Ok(model)
}

pub fn load_fragility(path: &Path) -> Result<FragilityModel> {
    let content = std::fs::read_to_string(path)?;
    parse_fragility(&content)
}

fn entry_functions(entry: &FragilityEntry, shape: Shape) -> Result<Vec<FragilityFunction>> {
    let marker = shape.marker();
    let mut functions = Vec::new();

    for (key, value) in &entry.parameters {
        let Some(label) = key.strip_suffix(marker) else {
            continue;
        };
        let (from_state, to_state) = parse_transition_label(label)
            .filter(|(from, to)| to > from)
            .ok_or_else(|| invalid(entry, format!("bad transition label {:?}", key)))?;

        let first = value
            .as_f64()
            .ok_or_else(|| invalid(entry, format!("{:?} is not a number", key)))?;
        let curve = match shape {
            Shape::LogNormal => {
                let stddev_key = format!("{}_stddev", label);
                let stddev = entry
                    .parameters
                    .get(&stddev_key)
                    .and_then(Value::as_f64)
                    .ok_or_else(|| invalid(entry, format!("missing {:?}", stddev_key)))?;
                FragilityCurve::log_normal(first, stddev)?
            }
            Shape::Constant => FragilityCurve::constant(first)?,
        };

        functions.push(FragilityFunction::new(
            entry.taxonomy.clone(),
            from_state,
            to_state,
            entry.imt.clone(),
            entry.imu.clone(),
            curve,
        ));
    }

    Ok(functions)
}

fn invalid(entry: &FragilityEntry, detail: String) -> ExposureError {
    ExposureError::InvalidReference(format!("fragility for {:?}: {}", entry.taxonomy, detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intensity::IntensitySample;

    #[test]
    fn test_parse_transition_label() {
        assert_eq!(parse_transition_label("D1"), Some((0, 1)));
        assert_eq!(parse_transition_label("D_0_3"), Some((0, 3)));
        assert_eq!(parse_transition_label("D_2_4"), Some((2, 4)));
        assert_eq!(parse_transition_label("D_2"), None);
        assert_eq!(parse_transition_label("X1"), None);
    }

    #[test]
    fn test_parse_flat_and_sublevel_keys() {
        let model = parse_fragility(
            r#"{
                "meta": {"id": "SARA_v1.0", "shape": "logncdf"},
                "data": [{
                    "taxonomy": "URM", "imt": "PGA", "imu": "g",
                    "D1_mean": 5.9, "D1_stddev": 0.8,
                    "D2_mean": 6.5, "D2_stddev": 0.8,
                    "D_1_3_mean": 7.0, "D_1_3_stddev": 0.7
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(model.schema(), "SARA_v1.0");
        assert_eq!(model.function_count(), 3);
        let from_one = model.transitions_from("URM", 1).unwrap();
        assert_eq!(from_one.len(), 1);
        assert_eq!(from_one[0].to_state, 3);

        let d1 = model
            .transitions_from("URM", 0)
            .unwrap()
            .into_iter()
            .find(|f| f.to_state == 1)
            .unwrap();
        let sample = IntensitySample::new().with("PGA", 1000.0, "g");
        let p = model.probability(d1, &sample).unwrap();
        assert!(p > 0.896 && p < 0.897);
        let zero = IntensitySample::new().with("PGA", 0.0, "g");
        assert!(model.probability(d1, &zero).unwrap() < 0.0001);
    }

    #[test]
    fn test_missing_stddev() {
        let result = parse_fragility(
            r#"{"meta": {"id": "S"}, "data": [
                {"taxonomy": "URM", "imt": "PGA", "imu": "g", "D1_mean": 1.0}]}"#,
        );
        assert!(matches!(result, Err(ExposureError::InvalidReference(_))));
    }

    #[test]
    fn test_backwards_transition_rejected() {
        let result = parse_fragility(
            r#"{"meta": {"id": "S"}, "data": [
                {"taxonomy": "URM", "imt": "PGA", "imu": "g",
                 "D_3_1_mean": 1.0, "D_3_1_stddev": 0.5}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_constant_shape() {
        let model = parse_fragility(
            r#"{"meta": {"id": "S", "shape": "constant"}, "data": [
                {"taxonomy": "TAX1", "imt": "MWH", "imu": "m",
                 "D1_probability": 0.5, "D2_probability": 0.25}]}"#,
        )
        .unwrap();
        let targets: Vec<DamageState> = model
            .transitions_from("TAX1", 0)
            .unwrap()
            .iter()
            .map(|f| f.to_state)
            .collect();
        assert_eq!(targets, vec![2, 1]);
    }

    #[test]
    fn test_unknown_shape() {
        let result = parse_fragility(r#"{"meta": {"id": "S", "shape": "weibull"}, "data": []}"#);
        assert!(matches!(result, Err(ExposureError::InvalidReference(_))));
    }
}
