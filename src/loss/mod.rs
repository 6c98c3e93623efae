//! Monetary loss from damage-state transitions.

pub mod document;
pub mod engine;
pub mod model;

pub use engine::{CellLoss, LossEngine};
pub use model::{LossMatrix, LossModel, ReplacementCostLoss, SchemaLoss};
