//! Pixel edges to physical-unit profiles.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{EdgeProfile, Stage};
use crate::error::FitError;

/// Row order of the input edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    /// First row is the icicle base (camera image order); reversed before fitting.
    BaseFirst,
    /// First row is the tip.
    TipFirst,
}

/// Pixel to length conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConversion {
    /// Pixels per unit length (per cm for the reference camera).
    pub ppcm: f64,
    /// z of the first (tip) sample.
    pub z_start: f64,
    pub orientation: Orientation,
}

impl Default for UnitConversion {
    fn default() -> Self {
        Self {
            ppcm: 95.0,
            z_start: 1.0,
            orientation: Orientation::BaseFirst,
        }
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Build a tip-first profile from a centred pixel edge.
///
/// Positions are divided by `ppcm`; `z` runs from `z_start` to `n / ppcm`.
pub fn build_profile(edge: &[f64], conversion: &UnitConversion) -> Result<EdgeProfile, FitError> {
    let ppcm = conversion.ppcm;
    if !(ppcm.is_finite() && ppcm > 0.0) {
        return Err(FitError::input_shape(
            Stage::Input,
            format!("pixels per unit length must be positive, got {ppcm}"),
        ));
    }

    let n = edge.len();
    let length = n as f64 / ppcm;
    if length <= conversion.z_start {
        return Err(FitError::input_shape(
            Stage::Input,
            format!(
                "profile of {n} rows is {length:.3} long, must exceed z_start = {}",
                conversion.z_start
            ),
        ));
    }

    let mut position: Vec<f64> = edge.iter().map(|p| p / ppcm).collect();
    if conversion.orientation == Orientation::BaseFirst {
        position.reverse();
    }
    EdgeProfile::new(linspace(conversion.z_start, length, n), position)
}
