//! Exposure update: the damage waterfall and the pipeline around it.

pub mod output;
pub mod pipeline;
pub mod waterfall;

pub use output::{InventorySummary, MergedCell, UpdateOutcome};
pub use pipeline::ExposureUpdater;
