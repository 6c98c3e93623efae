pub mod config;
pub mod error;
pub mod types;

pub use config::UpdateConfig;
pub use error::{ExposureError, Result};
pub use types::{format_damage_state, parse_damage_state, Coordinate, DamageState};
