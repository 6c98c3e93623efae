//! Loss reference models, one per schema.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::core::error::{ExposureError, Result};
use crate::core::types::DamageState;

/// Explicit per-taxonomy `from -> to` loss per building
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossMatrix {
    entries: AHashMap<String, BTreeMap<(DamageState, DamageState), f64>>,
}

impl LossMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        taxonomy: impl Into<String>,
        from_state: DamageState,
        to_state: DamageState,
        loss: f64,
    ) {
        self.entries
            .entry(taxonomy.into())
            .or_default()
            .insert((from_state, to_state), loss);
    }

    pub fn with(
        mut self,
        taxonomy: impl Into<String>,
        from_state: DamageState,
        to_state: DamageState,
        loss: f64,
    ) -> Self {
        self.insert(taxonomy, from_state, to_state, loss);
        self
    }

    fn loss_per_building(
        &self,
        schema: &str,
        taxonomy: &str,
        from_state: DamageState,
        to_state: DamageState,
    ) -> Result<f64> {
        let table = self
            .entries
            .get(taxonomy)
            .ok_or_else(|| missing(schema, taxonomy, "no loss matrix".to_string()))?;
        table.get(&(from_state, to_state)).copied().ok_or_else(|| {
            missing(
                schema,
                taxonomy,
                format!("no loss matrix entry D{} -> D{}", from_state, to_state),
            )
        })
    }
}

/// Damage-state loss steps combined with per-taxonomy replacement costs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementCostLoss {
    steps: BTreeMap<DamageState, f64>,
    costs: AHashMap<String, f64>,
    default_cost: Option<f64>,
}

impl ReplacementCostLoss {
    /// `steps` maps a damage state to its fraction of full replacement cost
    pub fn new(steps: BTreeMap<DamageState, f64>) -> Self {
        Self {
            steps,
            costs: AHashMap::new(),
            default_cost: None,
        }
    }

    pub fn with_cost(mut self, taxonomy: impl Into<String>, cost: f64) -> Self {
        self.costs.insert(taxonomy.into(), cost);
        self
    }

    /// Cost used for taxonomies without their own entry
    pub fn with_default_cost(mut self, cost: f64) -> Self {
        self.default_cost = Some(cost);
        self
    }

    /// Undamaged is step 0 unless stated otherwise
    fn step(&self, schema: &str, taxonomy: &str, state: DamageState) -> Result<f64> {
        match self.steps.get(&state) {
            Some(step) => Ok(*step),
            None if state == 0 => Ok(0.0),
            None => Err(missing(
                schema,
                taxonomy,
                format!("no loss step for D{}", state),
            )),
        }
    }

    fn replacement_cost(&self, schema: &str, taxonomy: &str) -> Result<f64> {
        self.costs
            .get(taxonomy)
            .copied()
            .or(self.default_cost)
            .ok_or_else(|| missing(schema, taxonomy, "no replacement cost".to_string()))
    }

    fn loss_per_building(
        &self,
        schema: &str,
        taxonomy: &str,
        from_state: DamageState,
        to_state: DamageState,
    ) -> Result<f64> {
        let cost = self.replacement_cost(schema, taxonomy)?;
        let from = self.step(schema, taxonomy, from_state)?;
        let to = self.step(schema, taxonomy, to_state)?;
        Ok((to - from) * cost)
    }
}

/// Loss reference of one schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaLoss {
    Matrix(LossMatrix),
    ReplacementCost(ReplacementCostLoss),
}

/// Loss references for every schema a run may price
#[derive(Debug, Clone, Default)]
pub struct LossModel {
    schemas: AHashMap<String, SchemaLoss>,
}

impl LossModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema: impl Into<String>, loss: SchemaLoss) {
        self.schemas.insert(schema.into(), loss);
    }

    pub fn with(mut self, schema: impl Into<String>, loss: SchemaLoss) -> Self {
        self.insert(schema, loss);
        self
    }

    pub fn contains_schema(&self, schema: &str) -> bool {
        self.schemas.contains_key(schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Monetary loss of one building moving `from_state -> to_state`
    pub fn loss_per_building(
        &self,
        schema: &str,
        taxonomy: &str,
        from_state: DamageState,
        to_state: DamageState,
    ) -> Result<f64> {
        match self.schemas.get(schema) {
            Some(SchemaLoss::Matrix(matrix)) => {
                matrix.loss_per_building(schema, taxonomy, from_state, to_state)
            }
            Some(SchemaLoss::ReplacementCost(model)) => {
                model.loss_per_building(schema, taxonomy, from_state, to_state)
            }
            None => Err(missing(schema, taxonomy, "unknown schema".to_string())),
        }
    }
}

fn missing(schema: &str, taxonomy: &str, detail: String) -> ExposureError {
    ExposureError::MissingLossData {
        schema: schema.to_string(),
        taxonomy: taxonomy.to_string(),
        detail,
    }
}
