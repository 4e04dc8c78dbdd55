//! Synthetic icicle edges from known growth parameters.
//!
//! The generator works in pixel space so the whole preparation chain
//! (spine centring, unit conversion, reversal) can be exercised:
//!
//! - profiles are evaluated tip-first on `z = linspace(z_start, rows / ppcm, rows)`
//! - half-widths are converted to pixels and placed around a (possibly leaning) spine
//! - rows are emitted base-first, like a camera image read top to bottom

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::EdgeParams;
use crate::error::AppError;
use crate::models::edge_response;
use crate::prep::{linspace, UnitConversion};

/// Parameters of one synthetic icicle image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticIcicle {
    /// Image rows covered by the icicle.
    pub rows: usize,
    pub conversion: UnitConversion,
    pub left: EdgeParams,
    pub right: EdgeParams,
    /// Column of the spine at the base row.
    pub spine_column: f64,
    /// Spine drift in columns per row (0 for a straight icicle).
    pub lean: f64,
    /// Standard deviation of Gaussian pixel noise on each edge.
    pub noise: f64,
    pub seed: u64,
}

impl SyntheticIcicle {
    /// Reference shape: `a = 0.5`, macro `0.15 sin(0.6z + 0.2)`, ripple
    /// `0.05 sin(4z + 0.1)`, identical on both sides.
    pub fn reference() -> Self {
        let params = EdgeParams::from_array([0.05, 4.0, 0.1, 0.5, 0.15, 0.6, 0.2, 0.0]);
        Self {
            rows: 855,
            conversion: UnitConversion::default(),
            left: params,
            right: params,
            spine_column: 640.0,
            lean: 0.0,
            noise: 0.0,
            seed: 42,
        }
    }
}

/// Pixel columns of both edges, base row first.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticEdges {
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

/// Edge position in physical units at each `z`.
pub fn synthetic_profile(params: &EdgeParams, z: &[f64]) -> Vec<f64> {
    z.iter().map(|&v| edge_response(v, params)).collect()
}

pub fn generate_edges(icicle: &SyntheticIcicle) -> Result<SyntheticEdges, AppError> {
    let ppcm = icicle.conversion.ppcm;
    if icicle.rows < 2 {
        return Err(AppError::new(2, "Synthetic icicle needs at least 2 rows."));
    }
    if !(ppcm.is_finite() && ppcm > 0.0) {
        return Err(AppError::new(2, "Pixels per unit length must be > 0."));
    }
    let length = icicle.rows as f64 / ppcm;
    if length <= icicle.conversion.z_start {
        return Err(AppError::new(
            2,
            format!(
                "Synthetic icicle of {} rows is shorter than z_start = {}.",
                icicle.rows, icicle.conversion.z_start
            ),
        ));
    }
    if !(icicle.noise.is_finite() && icicle.noise >= 0.0) {
        return Err(AppError::new(2, "Noise must be a finite, non-negative pixel count."));
    }

    let z = linspace(icicle.conversion.z_start, length, icicle.rows);
    let left_cm = synthetic_profile(&icicle.left, &z);
    let right_cm = synthetic_profile(&icicle.right, &z);
    if let Some(bad) = left_cm.iter().chain(&right_cm).find(|v| !v.is_finite()) {
        return Err(AppError::new(
            2,
            format!("Synthetic parameters give a non-finite edge ({bad}); check a_scale <= z_start."),
        ));
    }

    let mut rng = StdRng::seed_from_u64(icicle.seed);
    let normal = Normal::new(0.0, icicle.noise)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut left = Vec::with_capacity(icicle.rows);
    let mut right = Vec::with_capacity(icicle.rows);
    // Tip-first profiles, emitted base-first.
    for (row, i) in (0..icicle.rows).rev().enumerate() {
        let spine = icicle.spine_column + icicle.lean * row as f64;
        left.push(spine - left_cm[i] * ppcm + normal.sample(&mut rng));
        right.push(spine + right_cm[i] * ppcm + normal.sample(&mut rng));
    }

    Ok(SyntheticEdges { left, right })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::prep::{build_profile, normalize_spine};

    #[test]
    fn noiseless_edges_round_trip_through_preparation() {
        let icicle = SyntheticIcicle::reference();
        let edges = generate_edges(&icicle).unwrap();
        assert_eq!(edges.left.len(), 855);

        let centred = normalize_spine(&edges.left, &edges.right, 5.0).unwrap();
        assert!(!centred.corrected);
        let profile = build_profile(&centred.left, &icicle.conversion).unwrap();
        let expected = synthetic_profile(&icicle.left, profile.z());
        for (got, want) in profile.position().iter().zip(&expected) {
            assert_relative_eq!(*got, want.abs(), epsilon = 1e-9);
        }
    }

    #[test]
    fn same_seed_same_noise() {
        let icicle = SyntheticIcicle {
            noise: 1.5,
            ..SyntheticIcicle::reference()
        };
        assert_eq!(generate_edges(&icicle).unwrap(), generate_edges(&icicle).unwrap());
        let other = SyntheticIcicle { seed: 7, ..icicle.clone() };
        assert_ne!(generate_edges(&icicle).unwrap(), generate_edges(&other).unwrap());
    }

    #[test]
    fn leaning_spine_drifts() {
        let icicle = SyntheticIcicle {
            lean: 0.5,
            ..SyntheticIcicle::reference()
        };
        let edges = generate_edges(&icicle).unwrap();
        let mid_first = (edges.left[0] + edges.right[0]) / 2.0;
        let mid_last = (edges.left[854] + edges.right[854]) / 2.0;
        assert_relative_eq!(mid_last - mid_first, 0.5 * 854.0, epsilon = 1e-9);
    }

    #[test]
    fn short_icicle_is_rejected() {
        let icicle = SyntheticIcicle {
            rows: 50,
            ..SyntheticIcicle::reference()
        };
        assert_eq!(generate_edges(&icicle).unwrap_err().exit_code(), 2);
    }
}
