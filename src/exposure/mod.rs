//! Building exposure inventory: cells of taxonomy / damage-state bags and
//! the transition records an update produces.

pub mod bag;
pub mod cell;
pub mod document;
pub mod geometry;
pub mod transition;

pub use bag::{BagKey, BagMetadata, TaxonomyDamageBag};
pub use cell::{ExposureCell, ExposureCellBuilder};
pub use geometry::CellGeometry;
pub use transition::{Transition, TransitionCell, TransitionCellBuilder};
