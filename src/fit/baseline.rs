//! Stage 1: fit the distilled-water growth shape.
//!
//! The single parameter `a` is bounded to `(0, min z]` so that every sample
//! stays inside the model domain (`z / a ≥ 1`).

use tracing::debug;

use crate::domain::{EdgeProfile, FitConfig, MeasurementError, Stage, StageFit};
use crate::error::FitError;
use crate::math::{curve_fit, Bounds};
use crate::models::DistilledResponse;

/// Smallest admissible scale factor.
pub(crate) const MIN_SCALE: f64 = 1e-12;

/// Per-sample measurement error.
///
/// Defaults to half the first z-sampling interval, broadcast to every sample.
pub fn measurement_sigma(profile: &EdgeProfile, config: &FitConfig) -> Result<Vec<f64>, FitError> {
    let sigma = match &config.measurement_error {
        None => vec![profile.sampling_interval() / 2.0; profile.len()],
        Some(MeasurementError::Uniform(e)) => vec![*e; profile.len()],
        Some(MeasurementError::PerSample(errors)) => {
            if errors.len() != profile.len() {
                return Err(FitError::input_shape(
                    Stage::Baseline,
                    format!(
                        "{} measurement errors for {} samples",
                        errors.len(),
                        profile.len()
                    ),
                ));
            }
            errors.clone()
        }
    };

    if let Some(bad) = sigma.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(FitError::input_shape(
            Stage::Baseline,
            format!("measurement error must be finite and positive, got {bad}"),
        ));
    }
    Ok(sigma)
}

/// Fit `a` in `response(z) = a · 4/3 · (√(z/a) + 2) · √(√(z/a) − 1)`.
pub fn fit_baseline(profile: &EdgeProfile, sigma: &[f64], config: &FitConfig) -> Result<StageFit<1>, FitError> {
    let upper = profile.z_min();
    let seed = config.baseline_seed;
    if !(seed > 0.0 && seed <= upper) {
        return Err(FitError::bounds(
            Stage::Baseline,
            format!("seed a = {seed} outside model domain (0, {upper}]"),
        ));
    }

    let bounds = Bounds::new([MIN_SCALE.min(seed)], [upper]);
    let fit = curve_fit(
        &DistilledResponse,
        profile.z(),
        profile.position(),
        sigma,
        [seed],
        &bounds,
        config.absolute_sigma,
        &config.solver,
    )
    .map_err(|e| FitError::solver(Stage::Baseline, e))?;

    debug!(
        a = fit.params[0],
        var = fit.covariance[(0, 0)],
        iterations = fit.iterations,
        "baseline fitted"
    );

    Ok(StageFit {
        params: fit.params,
        covariance: fit.covariance,
    })
}
