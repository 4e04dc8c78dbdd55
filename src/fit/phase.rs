//! Ripple phase estimate from the first critical point of the residual.
//!
//! Single-sample heuristic: no averaging over later extrema.

use tracing::debug;

use crate::domain::{CriticalPoint, Curvature, FitConfig, ResidualSeries, Stage};
use crate::error::FitError;
use crate::math::{gaussian_smooth, gradient};

/// First index `j ≥ 1` where the smoothed gradient is zero or changes sign
/// against `j − 1`, with a non-zero second derivative.
pub fn first_critical_point(residual: &ResidualSeries, smoothing: f64) -> Option<CriticalPoint> {
    if residual.len() < 2 {
        return None;
    }
    let smoothed = gaussian_smooth(residual.values(), smoothing);
    let g = gradient(&smoothed, residual.z());
    let g2 = gradient(&g, residual.z());

    (1..g.len())
        .filter(|&j| g[j] == 0.0 || g[j] * g[j - 1] < 0.0)
        .map(|j| CriticalPoint {
            index: j,
            gradient: g[j],
            curvature: Curvature::from_second_derivative(g2[j]),
        })
        .find(|p| p.curvature != Curvature::Flat)
}

/// `ω/2 − z` at a concave critical point, `z − ω/2` otherwise.
pub fn estimate_phase(residual: &ResidualSeries, frequency: f64, config: &FitConfig) -> Result<f64, FitError> {
    let point = first_critical_point(residual, config.phase_smoothing).ok_or_else(|| {
        FitError::degenerate(
            Stage::Phase,
            format!("no critical point after smoothing width {}", config.phase_smoothing),
        )
    })?;

    let z = residual.z()[point.index];
    let phase = match point.curvature {
        Curvature::Concave => frequency / 2.0 - z,
        _ => z - frequency / 2.0,
    };
    debug!(index = point.index, z, ?point.curvature, phase, "phase estimate");
    Ok(phase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(f: impl Fn(f64) -> f64) -> ResidualSeries {
        let z: Vec<f64> = (0..200).map(|i| 1.0 + 9.0 * i as f64 / 199.0).collect();
        let v = z.iter().map(|&x| f(x)).collect();
        ResidualSeries::new(z, v, 0.01)
    }

    #[test]
    fn concave_first_extremum() {
        // Broad peak near z = 3.
        let r = series(|z| -(z - 3.0).powi(2));
        let p = first_critical_point(&r, 15.0).unwrap();
        assert_eq!(p.curvature, Curvature::Concave);
        let z = r.z()[p.index];
        assert!((z - 3.0).abs() < 0.1, "z = {z}");
        let phase = estimate_phase(&r, 4.0, &FitConfig::default()).unwrap();
        assert_relative_eq!(phase, 2.0 - z);
    }

    #[test]
    fn convex_first_extremum() {
        let r = series(|z| (z - 5.0).powi(2));
        let phase = estimate_phase(&r, 4.0, &FitConfig::default()).unwrap();
        let p = first_critical_point(&r, 15.0).unwrap();
        assert_eq!(p.curvature, Curvature::Convex);
        assert_relative_eq!(phase, r.z()[p.index] - 2.0);
    }

    #[test]
    fn monotonic_residual_has_no_phase() {
        let r = series(|z| 2.0 * z);
        let err = estimate_phase(&r, 4.0, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::DegenerateGuess { stage: Stage::Phase, .. }));
    }
}
