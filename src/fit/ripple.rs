//! Stage 3: fine-scale ripple sinusoid over the bulk region.

use std::f64::consts::PI;

use tracing::{debug, warn};

use crate::domain::{EdgeProfile, FitConfig, ResidualSeries, RippleBounds, RippleGuess, Stage, StageFit};
use crate::error::FitError;
use crate::math::{curve_fit, Bounds};
use crate::models::{wrap_phase, RippleSine};

const RIPPLE_LABELS: [&str; 3] = ["A", "w", "phi"];

/// Distance (relative to `1 + |bound|`) at which a fitted value counts as
/// sitting on its bound.
const BOUND_TOLERANCE: f64 = 1e-6;

/// Caller-supplied bounds, or the reference bounds derived from the profile.
///
/// Explicit bounds with `lower > upper` are rejected.
pub fn resolve_bounds(profile: &EdgeProfile, config: &FitConfig) -> Result<Bounds<3>, FitError> {
    let bounds = config
        .ripple_bounds
        .unwrap_or_else(|| RippleBounds::reference(profile))
        .to_bounds();
    for i in 0..3 {
        let (lo, hi) = (bounds.lower[i], bounds.upper[i]);
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(FitError::bounds(
                Stage::Ripple,
                format!("bounds of {} are inverted: [{lo}, {hi}]", RIPPLE_LABELS[i]),
            ));
        }
    }
    Ok(bounds)
}

/// Reject a seed outside `bounds` before any solve.
pub fn check_seed(seed: &RippleGuess, bounds: &Bounds<3>) -> Result<(), FitError> {
    let p = seed.to_array();
    match bounds.violation(&p) {
        Some(i) => Err(FitError::bounds(
            Stage::Ripple,
            format!(
                "seed {} = {} outside [{}, {}]",
                RIPPLE_LABELS[i], p[i], bounds.lower[i], bounds.upper[i]
            ),
        )),
        None => Ok(()),
    }
}

/// The same sinusoid as `seed`, written inside `bounds` if possible.
///
/// The phase is wrapped into `(−π, π]`; if it is still outside its bounds,
/// `(−A, φ ± π)` is tried. When no form fits, the wrapped seed is returned
/// and [`check_seed`] reports it.
pub fn equivalent_seed(seed: &RippleGuess, bounds: &Bounds<3>) -> RippleGuess {
    if bounds.violation(&seed.to_array()).is_none() {
        return *seed;
    }
    let phase = wrap_phase(seed.phase);
    let wrapped = RippleGuess { phase, ..*seed };
    let flipped = RippleGuess {
        amplitude: -seed.amplitude,
        frequency: seed.frequency,
        phase: if phase > 0.0 { phase - PI } else { phase + PI },
    };
    [wrapped, flipped]
        .into_iter()
        .find(|g| bounds.violation(&g.to_array()).is_none())
        .unwrap_or(wrapped)
}

/// Bounded fit of `A · sin(ω z + φ)` to the bulk residual.
///
/// The fit is rejected as a convergence failure when it leaves the ripple
/// regime: `ω` below half a period over the bulk region (the `ω → 0`
/// collapse onto an offset), or `ω`/`φ` ending on a bound.
pub fn fit_ripple(
    bulk: &ResidualSeries,
    seed: &RippleGuess,
    bounds: &Bounds<3>,
    config: &FitConfig,
) -> Result<StageFit<3>, FitError> {
    check_seed(seed, bounds)?;

    let sigma = vec![bulk.sigma(); bulk.len()];
    let fit = curve_fit(
        &RippleSine,
        bulk.z(),
        bulk.values(),
        &sigma,
        seed.to_array(),
        bounds,
        config.absolute_sigma,
        &config.solver,
    )
    .map_err(|e| FitError::solver(Stage::Ripple, e))?;

    let span = bulk.z()[bulk.len() - 1] - bulk.z()[0];
    let min_frequency = PI / span;
    if fit.params[1].abs() < min_frequency {
        warn!(params = ?fit.params, "ripple fit collapsed");
        return Err(FitError::convergence(
            Stage::Ripple,
            format!(
                "w = {} is below half a period over the bulk region ({min_frequency})",
                fit.params[1]
            ),
        ));
    }
    for i in [1, 2] {
        let value = fit.params[i];
        let on_bound =
            |bound: f64| bound.is_finite() && (value - bound).abs() <= BOUND_TOLERANCE * (1.0 + bound.abs());
        if on_bound(bounds.lower[i]) || on_bound(bounds.upper[i]) {
            warn!(params = ?fit.params, "ripple fit ended on a bound");
            return Err(FitError::convergence(
                Stage::Ripple,
                format!(
                    "{} = {value} settled on its bound [{}, {}]",
                    RIPPLE_LABELS[i], bounds.lower[i], bounds.upper[i]
                ),
            ));
        }
    }

    debug!(params = ?fit.params, iterations = fit.iterations, "ripple fitted");

    Ok(StageFit {
        params: fit.params,
        covariance: fit.covariance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::math::ResponseModel;

    fn bulk() -> ResidualSeries {
        let z: Vec<f64> = (0..160).map(|i| 2.8 + 7.2 * i as f64 / 159.0).collect();
        let v = z.iter().map(|&x| 0.05 * (4.0 * x + 0.1).sin()).collect();
        ResidualSeries::new(z, v, 0.02)
    }

    fn profile() -> EdgeProfile {
        let z: Vec<f64> = (0..200).map(|i| 1.0 + 9.0 * i as f64 / 199.0).collect();
        let r = z.iter().map(|&v| 0.5 * v).collect();
        EdgeProfile::new(z, r).unwrap()
    }

    #[test]
    fn refines_nearby_seed() {
        let bounds = resolve_bounds(&profile(), &FitConfig::default()).unwrap();
        let seed = RippleGuess {
            amplitude: 0.045,
            frequency: 4.1,
            phase: 0.0,
        };
        let fit = fit_ripple(&bulk(), &seed, &bounds, &FitConfig::default()).unwrap();
        assert_relative_eq!(fit.params[0], 0.05, max_relative = 1e-4);
        assert_relative_eq!(fit.params[1], 4.0, max_relative = 1e-4);
        assert_relative_eq!(fit.params[2], 0.1, epsilon = 1e-3);
        for i in 0..3 {
            assert!(fit.std_error(i).is_finite());
        }
    }

    #[test]
    fn reference_bounds_follow_profile() {
        let bounds = resolve_bounds(&profile(), &FitConfig::default()).unwrap();
        assert_relative_eq!(bounds.upper[0], 5.0);
        assert_relative_eq!(bounds.upper[1], 20.0);
        assert_relative_eq!(bounds.lower[2], -std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn seed_outside_bounds_is_rejected() {
        let bounds = resolve_bounds(&profile(), &FitConfig::default()).unwrap();
        let seed = RippleGuess {
            amplitude: 0.05,
            frequency: 4.0,
            phase: 2.0,
        };
        let err = fit_ripple(&bulk(), &seed, &bounds, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::BoundsViolation { stage: Stage::Ripple, .. }));
    }

    #[test]
    fn out_of_range_phase_is_rewritten_inside_bounds() {
        let bounds = resolve_bounds(&profile(), &FitConfig::default()).unwrap();
        let seed = RippleGuess {
            amplitude: 0.066,
            frequency: 4.0,
            phase: -5.2167,
        };
        let g = equivalent_seed(&seed, &bounds);
        assert!(bounds.violation(&g.to_array()).is_none());
        assert_relative_eq!(g.amplitude, 0.066);
        assert_relative_eq!(g.phase, -5.2167 + 2.0 * PI, epsilon = 1e-12);

        let seed = RippleGuess { phase: 2.5, ..seed };
        let g = equivalent_seed(&seed, &bounds);
        assert_relative_eq!(g.amplitude, -0.066);
        assert_relative_eq!(g.phase, 2.5 - PI, epsilon = 1e-12);
        for k in 0..10 {
            let z = 3.0 + 0.3 * k as f64;
            assert_relative_eq!(
                RippleSine.evaluate(z, &seed.to_array()),
                RippleSine.evaluate(z, &g.to_array()),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn seed_already_inside_is_kept() {
        let bounds = resolve_bounds(&profile(), &FitConfig::default()).unwrap();
        let seed = RippleGuess {
            amplitude: 0.05,
            frequency: 4.0,
            phase: 0.1,
        };
        assert_eq!(equivalent_seed(&seed, &bounds), seed);
    }

    #[test]
    fn fit_collapsing_onto_offset_is_rejected() {
        // A constant residual is fitted best by w -> 0, phi -> pi/2.
        let z: Vec<f64> = (0..160).map(|i| 2.8 + 7.2 * i as f64 / 159.0).collect();
        let offset = ResidualSeries::new(z.clone(), vec![0.05; z.len()], 0.02);
        let bounds = resolve_bounds(&profile(), &FitConfig::default()).unwrap();
        let seed = RippleGuess {
            amplitude: 0.05,
            frequency: 0.2,
            phase: 0.3,
        };
        let err = fit_ripple(&offset, &seed, &bounds, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::Convergence { stage: Stage::Ripple, .. }), "{err}");
    }

    #[test]
    fn inverted_explicit_bounds_are_rejected() {
        let cfg = FitConfig {
            ripple_bounds: Some(RippleBounds {
                amplitude: (1.0, -1.0),
                frequency: (0.0, 10.0),
                phase: (-1.0, 1.0),
            }),
            ..FitConfig::default()
        };
        let err = resolve_bounds(&profile(), &cfg).unwrap_err();
        assert!(matches!(err, FitError::BoundsViolation { .. }));
    }
}
