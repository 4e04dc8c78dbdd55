//! Centre left/right pixel edges on the icicle spine.
//!
//! The spine is the midpoint of the two edges. A straight icicle is centred
//! on the spine mean; a curved one (spine strays more than `threshold`
//! pixels from its mean) is centred on a least-squares line through the
//! spine instead.

use tracing::debug;

use crate::domain::Stage;
use crate::error::FitError;
use crate::math::{fit_line, mean};
use crate::prep::units::linspace;

/// Edge distances from the spine, in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CenteredEdges {
    pub left: Vec<f64>,
    pub right: Vec<f64>,
    /// True when the linear spine correction was applied.
    pub corrected: bool,
}

pub fn normalize_spine(left: &[f64], right: &[f64], threshold: f64) -> Result<CenteredEdges, FitError> {
    if left.len() != right.len() {
        return Err(FitError::input_shape(
            Stage::Input,
            format!("left edge has {} rows, right edge has {}", left.len(), right.len()),
        ));
    }
    let spine: Vec<f64> = left.iter().zip(right).map(|(l, r)| (l + r) / 2.0).collect();
    let Some(spine_mean) = mean(&spine) else {
        return Err(FitError::input_shape(Stage::Input, "edges are empty"));
    };

    let deviation = spine.iter().map(|s| (s - spine_mean).abs()).fold(0.0, f64::max);
    if deviation > threshold {
        let x = linspace(0.0, spine.len() as f64, spine.len());
        let (intercept, slope) = fit_line(&x, &spine)
            .ok_or_else(|| FitError::input_shape(Stage::Input, "spine line fit is degenerate"))?;
        debug!(deviation, intercept, slope, "curved spine, applying linear correction");

        let line = |i: usize| intercept + slope * x[i];
        return Ok(CenteredEdges {
            left: left.iter().enumerate().map(|(i, l)| (l - line(i)).abs()).collect(),
            right: right.iter().enumerate().map(|(i, r)| (r - line(i)).abs()).collect(),
            corrected: true,
        });
    }

    Ok(CenteredEdges {
        left: left.iter().map(|l| (spine_mean - l).abs()).collect(),
        right: right.iter().map(|r| (r - spine_mean).abs()).collect(),
        corrected: false,
    })
}
