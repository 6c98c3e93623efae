//! Waterfall reallocation of one cell's buildings across damage states.
//!
//! For every bag, the fragility transitions leaving its state are applied
//! most severe first. Each transition claims its probability's share of
//! what is still left in the original state, so the bag is never counted
//! twice and the remainder can only shrink towards zero.

use crate::core::error::Result;
use crate::core::types::sanitize_count;
use crate::exposure::{ExposureCell, Transition, TransitionCell, TransitionCellBuilder};
use crate::fragility::FragilityModel;
use crate::intensity::IntensitySample;

/// Apply fragility at one intensity sample to a cell.
///
/// Returns the updated cell and the transitions that produced it. A bag
/// whose state has no onward transitions is carried over unchanged; a
/// taxonomy unknown to the fragility model is an error.
pub fn update_cell(
    cell: &ExposureCell,
    fragility: &FragilityModel,
    sample: &IntensitySample,
) -> Result<(ExposureCell, TransitionCell)> {
    let mut updated = cell.derive(cell.schema());
    let mut transitions = TransitionCellBuilder::for_cell(cell);

    for bag in cell.bags() {
        let candidates = fragility.transitions_from(&bag.taxonomy, bag.damage_state)?;
        if candidates.is_empty() {
            updated.add(bag.clone());
            continue;
        }

        let mut remaining = sanitize_count(bag.buildings);
        for function in candidates {
            let probability = fragility.probability(function, sample)?;
            let moved = probability * remaining;
            remaining -= moved;
            debug_assert!(remaining >= 0.0);

            if moved > 0.0 {
                transitions.add(Transition::new(
                    bag.schema.clone(),
                    bag.taxonomy.clone(),
                    bag.damage_state,
                    function.to_state,
                    moved,
                ));
                updated.add(bag.moved_to(function.to_state, moved));
            }
        }

        if remaining > 0.0 {
            updated.add(bag.moved_to(bag.damage_state, remaining));
        }
    }

    Ok((updated.build(), transitions.build()))
}
