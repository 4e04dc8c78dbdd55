//! Optional last stage: refit all eight parameters at once.
//!
//! The staged fits are biased against each other: the baseline soaks up part
//! of the macro oscillation, so the macro fit inherits a distorted residual.
//! A single bounded solve of the full edge model over the whole profile,
//! started from the staged values, removes that bias.

use tracing::debug;

use crate::domain::{EdgeParams, EdgeProfile, FitConfig, ResidualSeries, Stage, StageFit};
use crate::error::FitError;
use crate::fit::baseline::MIN_SCALE;
use crate::math::{curve_fit, Bounds, ResponseModel};
use crate::models::EdgeModel;

/// Joint fit of `[A_r, ω_r, φ_r, a, A_m, ω_m, φ_m, C]` to the measured edge.
///
/// `a` keeps the baseline domain `(0, min z]` and both frequencies stay
/// non-negative; everything else is free. `staged` must already satisfy
/// those limits (normalised stage output does).
pub fn refine_edge(
    profile: &EdgeProfile,
    sigma: &[f64],
    staged: &EdgeParams,
    config: &FitConfig,
) -> Result<StageFit<8>, FitError> {
    let start = staged.to_array();
    let mut bounds = Bounds::<8>::unbounded();
    bounds.lower[1] = 0.0;
    bounds.lower[3] = MIN_SCALE.min(start[3]);
    bounds.upper[3] = profile.z_min();
    bounds.lower[5] = 0.0;

    let fit = curve_fit(
        &EdgeModel,
        profile.z(),
        profile.position(),
        sigma,
        start,
        &bounds,
        config.absolute_sigma,
        &config.solver,
    )
    .map_err(|e| FitError::solver(Stage::Refine, e))?;

    debug!(params = ?fit.params, iterations = fit.iterations, ?fit.termination, "joint refinement");

    Ok(StageFit {
        params: fit.params,
        covariance: fit.covariance,
    })
}

/// `position − edge model`, with the measurement error of the first sample.
pub fn residual_after(profile: &EdgeProfile, params: &[f64; 8], sigma: f64) -> ResidualSeries {
    let values = profile
        .z()
        .iter()
        .zip(profile.position())
        .map(|(&z, &r)| r - EdgeModel.evaluate(z, params))
        .collect();
    ResidualSeries::new(profile.z().to_vec(), values, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::models::edge_response;

    fn truth() -> EdgeParams {
        EdgeParams::from_array([0.05, 4.0, 0.1, 0.5, 0.15, 0.6, 0.2, 0.0])
    }

    fn profile() -> EdgeProfile {
        let z: Vec<f64> = (0..200).map(|i| 1.0 + 9.0 * i as f64 / 199.0).collect();
        let position = z.iter().map(|&v| edge_response(v, &truth())).collect();
        EdgeProfile::new(z, position).unwrap()
    }

    #[test]
    fn removes_staged_bias() {
        let profile = profile();
        let sigma = vec![profile.sampling_interval() / 2.0; profile.len()];
        // Typical staged output: baseline low, macro pulled off its phase.
        let staged = EdgeParams::from_array([0.0494, 3.993, 0.1307, 0.4882, 0.1351, 0.6646, -0.1728, 0.0337]);

        let fit = refine_edge(&profile, &sigma, &staged, &FitConfig::default()).unwrap();
        for (got, want) in fit.params.iter().zip(truth().to_array()) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
        for k in 0..8 {
            assert!(fit.std_error(k).is_finite());
        }

        let residual = residual_after(&profile, &fit.params, sigma[0]);
        assert!(residual.values().iter().all(|v| v.abs() < 1e-8));
    }

    #[test]
    fn scale_stays_inside_baseline_domain() {
        let profile = profile();
        let sigma = vec![0.02; profile.len()];
        let staged = EdgeParams::from_array([0.05, 4.0, 0.1, profile.z_min(), 0.15, 0.6, 0.2, 0.0]);
        let fit = refine_edge(&profile, &sigma, &staged, &FitConfig::default()).unwrap();
        assert!(fit.params[3] > 0.0 && fit.params[3] <= profile.z_min());
    }
}
