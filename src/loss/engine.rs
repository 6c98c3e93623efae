//! Prices transition records.

use serde::Serialize;

use super::model::LossModel;
use crate::core::error::Result;
use crate::exposure::{Transition, TransitionCell};

/// Loss of one cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellLoss {
    pub loss_value: f64,
    pub loss_unit: String,
}

/// Converts transitions into monetary loss
#[derive(Debug, Clone)]
pub struct LossEngine {
    model: LossModel,
    unit: String,
}

impl LossEngine {
    pub fn new(model: LossModel, unit: impl Into<String>) -> Self {
        Self {
            model,
            unit: unit.into(),
        }
    }

    pub fn model(&self) -> &LossModel {
        &self.model
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Loss of all buildings in one transition
    pub fn loss_for(&self, transition: &Transition) -> Result<f64> {
        let per_building = self.model.loss_per_building(
            &transition.schema,
            &transition.taxonomy,
            transition.from_state,
            transition.to_state,
        )?;
        Ok(per_building * transition.buildings)
    }

    /// Sum over every transition of a cell
    pub fn cell_loss(&self, cell: &TransitionCell) -> Result<CellLoss> {
        let mut loss_value = 0.0;
        for transition in cell.transitions() {
            loss_value += self.loss_for(transition)?;
        }
        Ok(CellLoss {
            loss_value,
            loss_unit: self.unit.clone(),
        })
    }
}
