//! Fragility functions: probability of reaching or exceeding a damage state
//! as a function of hazard intensity.

use statrs::distribution::{ContinuousCDF, LogNormal};

use crate::core::error::{ExposureError, Result};
use crate::core::types::DamageState;

/// Shape of a fragility curve
#[derive(Debug, Clone, PartialEq)]
pub enum FragilityCurve {
    /// Lognormal CDF: `Φ((ln x - mean) / stddev)`
    LogNormal {
        mean: f64,
        stddev: f64,
        distribution: LogNormal,
    },
    /// Flat probability, independent of intensity
    Constant(f64),
}

impl FragilityCurve {
    pub fn log_normal(mean: f64, stddev: f64) -> Result<Self> {
        if !mean.is_finite() || !stddev.is_finite() || stddev <= 0.0 {
            return Err(ExposureError::InvalidReference(format!(
                "lognormal fragility needs finite mean and positive stddev, got ({}, {})",
                mean, stddev
            )));
        }
        let distribution = LogNormal::new(mean, stddev)
            .map_err(|e| ExposureError::InvalidReference(e.to_string()))?;
        Ok(FragilityCurve::LogNormal {
            mean,
            stddev,
            distribution,
        })
    }

    pub fn constant(probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ExposureError::InvalidReference(format!(
                "constant fragility probability {} outside [0, 1]",
                probability
            )));
        }
        Ok(FragilityCurve::Constant(probability))
    }

    /// Probability in `[0, 1]`; non-positive or NaN intensity gives 0 for
    /// the lognormal shape
    pub fn probability(&self, intensity: f64) -> f64 {
        match self {
            FragilityCurve::LogNormal { distribution, .. } => {
                if intensity.is_nan() || intensity <= 0.0 {
                    0.0
                } else {
                    distribution.cdf(intensity).clamp(0.0, 1.0)
                }
            }
            FragilityCurve::Constant(p) => *p,
        }
    }
}

/// One transition curve of a taxonomy
#[derive(Debug, Clone, PartialEq)]
pub struct FragilityFunction {
    pub taxonomy: String,
    pub from_state: DamageState,
    pub to_state: DamageState,
    pub intensity_field: String,
    pub intensity_unit: String,
    pub curve: FragilityCurve,
}

impl FragilityFunction {
    pub fn new(
        taxonomy: impl Into<String>,
        from_state: DamageState,
        to_state: DamageState,
        intensity_field: impl Into<String>,
        intensity_unit: impl Into<String>,
        curve: FragilityCurve,
    ) -> Self {
        Self {
            taxonomy: taxonomy.into(),
            from_state,
            to_state,
            intensity_field: intensity_field.into(),
            intensity_unit: intensity_unit.into(),
            curve,
        }
    }

    pub fn probability(&self, intensity: f64) -> f64 {
        self.curve.probability(intensity)
    }
}
