//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Ordinal damage severity; 0 is undamaged
pub type DamageState = u32;

/// Parse a damage state label.
///
/// Accepts `"D<n>"` (the exposure and conversion convention) as well as a
/// bare integer (used as keys in some loss matrices).
pub fn parse_damage_state(label: &str) -> Option<DamageState> {
    let label = label.trim();
    let digits = label
        .strip_prefix('D')
        .or_else(|| label.strip_prefix('d'))
        .unwrap_or(label);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Format a damage state the way exposure documents spell it
pub fn format_damage_state(state: DamageState) -> String {
    format!("D{}", state)
}

/// Geographic position (longitude, latitude in the hazard grid's CRS)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Treat non-finite or negative building counts as empty
pub fn sanitize_count(count: f64) -> f64 {
    if !count.is_finite() || count < 0.0 {
        tracing::warn!("Building count {} replaced by 0", count);
        0.0
    } else {
        count
    }
}
