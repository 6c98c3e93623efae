//! Per-cell update pipeline and its batch driver.
//!
//! One cell flows through schema mapping, intensity lookup at its centroid,
//! the damage waterfall, a conservation check and loss pricing. Cells are
//! independent, so large batches run on the rayon pool; results keep input
//! order either way.

use rayon::prelude::*;

use super::output::{InventorySummary, UpdateOutcome};
use super::waterfall;
use crate::core::config::UpdateConfig;
use crate::core::error::{ExposureError, Result};
use crate::exposure::ExposureCell;
use crate::fragility::FragilityModel;
use crate::intensity::IntensityProvider;
use crate::loss::LossEngine;
use crate::schema::SchemaMapper;

/// Runs one update cycle over exposure cells
pub struct ExposureUpdater {
    intensity: Box<dyn IntensityProvider>,
    fragility: FragilityModel,
    mapper: Option<SchemaMapper>,
    loss: LossEngine,
    config: UpdateConfig,
}

impl ExposureUpdater {
    /// Assemble an updater; fails when the configuration is invalid
    pub fn new(
        intensity: Box<dyn IntensityProvider>,
        fragility: FragilityModel,
        loss: LossEngine,
        config: UpdateConfig,
    ) -> Result<Self> {
        config.validate().map_err(ExposureError::Config)?;
        Ok(Self {
            intensity,
            fragility,
            mapper: None,
            loss,
            config,
        })
    }

    /// Map cells whose schema differs from the fragility schema
    pub fn with_mapper(mut self, mapper: SchemaMapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn fragility(&self) -> &FragilityModel {
        &self.fragility
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Update a single cell
    pub fn update_cell(&self, cell: &ExposureCell) -> Result<UpdateOutcome> {
        let target_schema = self.fragility.schema();
        let mapped;
        let cell = if cell.schema() == target_schema {
            cell
        } else {
            let mapper = self.mapper.as_ref().ok_or_else(|| {
                ExposureError::Config(format!(
                    "cell {} uses schema {} but fragility expects {} and no conversion is loaded",
                    cell.gid(),
                    cell.schema(),
                    target_schema
                ))
            })?;
            mapped = mapper.map_cell(cell, target_schema)?;
            &mapped
        };

        let centroid = cell.centroid().ok_or_else(|| ExposureError::MissingCentroid {
            gid: cell.gid().to_string(),
        })?;
        let sample = self.intensity.nearest(centroid.lon, centroid.lat);

        let (exposure, transitions) = waterfall::update_cell(cell, &self.fragility, &sample)?;

        let before = cell.total_buildings();
        let after = exposure.total_buildings();
        if self.config.check_conservation
            && !conserved(before, after, self.config.conservation_tolerance)
        {
            return Err(ExposureError::ConservationViolated {
                gid: cell.gid().to_string(),
                before,
                after,
            });
        }

        let loss = self.loss.cell_loss(&transitions)?;
        tracing::debug!(
            "Updated cell {}: {} transitions, loss {} {}",
            exposure.gid(),
            transitions.transitions().len(),
            loss.loss_value,
            loss.loss_unit
        );

        Ok(UpdateOutcome {
            buildings_before: before,
            exposure,
            transitions,
            loss,
        })
    }

    /// Update every cell, in order. The first failing cell aborts the batch.
    pub fn update_all(&self, cells: &[ExposureCell]) -> Result<Vec<UpdateOutcome>> {
        let outcomes: Vec<UpdateOutcome> =
            if self.config.parallel && cells.len() >= self.config.parallel_threshold {
                // PARALLEL: cells share only read-only reference data
                cells
                    .par_iter()
                    .map(|cell| self.update_cell(cell))
                    .collect::<Result<_>>()?
            } else {
                cells
                    .iter()
                    .map(|cell| self.update_cell(cell))
                    .collect::<Result<_>>()?
            };

        let summary = InventorySummary::from_outcomes(&outcomes);
        tracing::info!(
            "Updated {} cells: {:.3} buildings before, {:.3} after, {} moved, loss {:.2} {}",
            summary.cells,
            summary.buildings_before,
            summary.buildings_after,
            summary.buildings_moved,
            summary.loss_value,
            self.loss.unit()
        );
        Ok(outcomes)
    }
}

/// Totals agree within `tolerance` relative to the larger of `before` and 1
fn conserved(before: f64, after: f64, tolerance: f64) -> bool {
    (before - after).abs() <= tolerance * before.abs().max(1.0)
}
