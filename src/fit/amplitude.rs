//! Ripple amplitude/frequency estimate from critical points of the residual.
//!
//! The bulk residual is smoothed and differentiated twice. Critical points
//! (near-zero gradient with a genuine sign change) are paired peak-to-trough;
//! each pair is half a ripple period and gives one amplitude and one
//! frequency sample.

use std::f64::consts::PI;

use tracing::debug;

use crate::domain::{CriticalPoint, Curvature, FitConfig, ResidualSeries, Stage};
use crate::error::FitError;
use crate::math::{gaussian_smooth, gradient, mean, std_dev};

/// Mean and spread of the per-pair samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeFrequencyGuess {
    pub amplitude: f64,
    pub amplitude_std: f64,
    pub frequency: f64,
    pub frequency_std: f64,
    /// Critical-point pairs that contributed, in scan order.
    pub pairs: Vec<(CriticalPoint, CriticalPoint)>,
}

/// Smallest series the estimator accepts for a given smoothing resolution.
pub fn min_samples(resolution: usize) -> usize {
    (2 * resolution).max(4)
}

pub fn estimate_amplitude_frequency(
    bulk: &ResidualSeries,
    config: &FitConfig,
) -> Result<AmplitudeFrequencyGuess, FitError> {
    let r = config.smoothing_resolution;
    let n = bulk.len();
    if r == 0 {
        return Err(FitError::input_shape(
            Stage::AmplitudeFrequency,
            "smoothing resolution must be at least 1",
        ));
    }
    if n < min_samples(r) {
        return Err(FitError::input_shape(
            Stage::AmplitudeFrequency,
            format!("bulk region has {n} samples, need at least {}", min_samples(r)),
        ));
    }

    let z = bulk.z();
    let values = bulk.values();
    let smoothed = gaussian_smooth(values, r as f64);
    let g = gradient(&smoothed, z);
    let g2 = gradient(&g, z);

    let mut pending: Option<CriticalPoint> = None;
    let mut pairs = Vec::new();
    let mut amplitudes = Vec::new();
    let mut frequencies = Vec::new();

    for i in r..n - 1 {
        if !config.full_scan && pairs.len() >= config.iteration_cap {
            break;
        }
        if !is_critical(&g, i, r, config.amplitude_threshold) {
            continue;
        }

        let point = CriticalPoint {
            index: i,
            gradient: g[i],
            curvature: Curvature::from_second_derivative(g2[i]),
        };
        match pending {
            None => pending = Some(point),
            Some(open) if open.curvature.opposes(point.curvature) => {
                amplitudes.push(((values[open.index] - values[i]) / 2.0).abs());
                frequencies.push(PI / (z[i] - z[open.index]));
                pairs.push((open, point));
                pending = None;
            }
            Some(_) => {}
        }
    }

    let (Some(amplitude), Some(amplitude_std), Some(frequency), Some(frequency_std)) = (
        mean(&amplitudes),
        std_dev(&amplitudes),
        mean(&frequencies),
        std_dev(&frequencies),
    ) else {
        return Err(FitError::degenerate(
            Stage::AmplitudeFrequency,
            format!("no critical-point pairs below gradient threshold {}", config.amplitude_threshold),
        ));
    };

    debug!(
        amplitude,
        amplitude_std,
        frequency,
        frequency_std,
        pairs = pairs.len(),
        "amplitude/frequency estimate"
    );

    Ok(AmplitudeFrequencyGuess {
        amplitude,
        amplitude_std,
        frequency,
        frequency_std,
        pairs,
    })
}

/// Small gradient, opposite mean slope on either side, and a sign change
/// between neighbouring samples.
fn is_critical(g: &[f64], i: usize, r: usize, threshold: f64) -> bool {
    if g[i].abs() >= threshold {
        return false;
    }
    let end = (i + r).min(g.len());
    let (Some(before), Some(after)) = (mean(&g[i - r..i]), mean(&g[i..end])) else {
        return false;
    };
    if before * after >= 0.0 {
        return false;
    }
    g[i] * g[i + 1] < 0.0 || g[i] * g[i - 1] < 0.0 || g[i - 1] * g[i + 1] < 0.0
}
