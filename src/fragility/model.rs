//! Fragility functions of one schema, indexed by taxonomy.

use ahash::AHashMap;

use super::function::FragilityFunction;
use crate::core::error::{ExposureError, Result};
use crate::core::types::DamageState;
use crate::intensity::IntensitySample;

/// All fragility functions of one schema.
///
/// Immutable after loading, so a single model can be shared across worker
/// threads.
#[derive(Debug, Clone)]
pub struct FragilityModel {
    schema: String,
    functions: AHashMap<String, Vec<FragilityFunction>>,
}

impl FragilityModel {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            functions: AHashMap::new(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn insert(&mut self, function: FragilityFunction) {
        self.functions
            .entry(function.taxonomy.clone())
            .or_default()
            .push(function);
    }

    pub fn with(mut self, function: FragilityFunction) -> Self {
        self.insert(function);
        self
    }

    pub fn contains_taxonomy(&self, taxonomy: &str) -> bool {
        self.functions.contains_key(taxonomy)
    }

    /// Sorted taxonomy names
    pub fn taxonomies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn function_count(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    /// All functions of a taxonomy
    pub fn functions_for(&self, taxonomy: &str) -> Result<&[FragilityFunction]> {
        self.functions
            .get(taxonomy)
            .map(Vec::as_slice)
            .ok_or_else(|| ExposureError::UnknownTaxonomy {
                schema: self.schema.clone(),
                taxonomy: taxonomy.to_string(),
            })
    }

    /// Functions leaving `from_state` towards a worse state, most severe
    /// destination first.
    ///
    /// The order decides how much of the remaining population each
    /// successive transition claims. An empty result is legal: the state
    /// simply has no onward transitions.
    pub fn transitions_from(
        &self,
        taxonomy: &str,
        from_state: DamageState,
    ) -> Result<Vec<&FragilityFunction>> {
        let mut transitions: Vec<&FragilityFunction> = self
            .functions_for(taxonomy)?
            .iter()
            .filter(|f| f.from_state == from_state && f.to_state > from_state)
            .collect();
        transitions.sort_by(|a, b| b.to_state.cmp(&a.to_state));
        Ok(transitions)
    }

    /// Evaluate a function against an intensity sample.
    ///
    /// The sample must report the function's field in exactly the unit the
    /// function was fitted in; nothing is converted here.
    pub fn probability(
        &self,
        function: &FragilityFunction,
        sample: &IntensitySample,
    ) -> Result<f64> {
        let field = &function.intensity_field;
        let value = sample
            .value(field)
            .ok_or_else(|| ExposureError::MissingIntensity {
                field: field.clone(),
            })?;
        let unit = sample.unit(field).unwrap_or_default();
        if unit != function.intensity_unit {
            return Err(ExposureError::UnitMismatch {
                field: field.clone(),
                expected: function.intensity_unit.clone(),
                found: unit.to_string(),
            });
        }
        Ok(function.probability(value))
    }
}
