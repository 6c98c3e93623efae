use thiserror::Error;

use crate::core::types::DamageState;

#[derive(Error, Debug)]
pub enum ExposureError {
    #[error("Unknown taxonomy {taxonomy:?} for schema {schema:?}")]
    UnknownTaxonomy { schema: String, taxonomy: String },

    #[error("Unknown damage state D{damage_state} for schema {schema:?}")]
    UnknownDamageState {
        schema: String,
        damage_state: DamageState,
    },

    #[error("Unit mismatch for intensity field {field:?}: expected {expected:?}, found {found:?}")]
    UnitMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Intensity field {field:?} is not provided by the intensity source")]
    MissingIntensity { field: String },

    #[error(
        "Invalid conversion matrix {source_schema} -> {target_schema}: row {key:?} sums to {sum}"
    )]
    InvalidConversionMatrix {
        source_schema: String,
        target_schema: String,
        key: String,
        sum: f64,
    },

    #[error("No loss data for taxonomy {taxonomy:?} in schema {schema:?}: {detail}")]
    MissingLossData {
        schema: String,
        taxonomy: String,
        detail: String,
    },

    #[error("Intensity index needs at least one site")]
    EmptySiteSet,

    #[error("Cell {gid:?} has no usable centroid")]
    MissingCentroid { gid: String },

    #[error("Building count for cell {gid:?} changed from {before} to {after}")]
    ConservationViolated { gid: String, before: f64, after: f64 },

    #[error("Invalid reference data: {0}")]
    InvalidReference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExposureError>;
