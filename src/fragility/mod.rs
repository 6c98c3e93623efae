//! Fragility models: per-taxonomy damage-state transition curves.

pub mod document;
pub mod function;
pub mod model;

pub use function::{FragilityCurve, FragilityFunction};
pub use model::FragilityModel;
