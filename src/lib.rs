//! Exposure Update - damage-state reallocation of building inventories
//!
//! Given an exposure inventory (buildings per taxonomy and damage state per
//! cell), a hazard intensity field and fragility functions, computes how many
//! buildings move to worse damage states, the updated inventory and the
//! resulting monetary loss.

pub mod core;
pub mod exposure;
pub mod fragility;
pub mod intensity;
pub mod loss;
pub mod schema;
pub mod update;
