//! Cross-schema remapping of building classes and damage states.

pub mod document;
pub mod mapper;
pub mod matrix;

pub use document::ConversionLibrary;
pub use mapper::{
    BuildingClassMapper, BuildingClassSpecificDamageStateMapper, DamageStateMapper,
    MatrixBuildingClassMapper, MatrixDamageStateMapper, SchemaMapper, SchemaMapperResult,
};
pub use matrix::ConversionMatrix;
