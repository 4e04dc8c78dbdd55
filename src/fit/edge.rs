//! Full edge fit: baseline, macro oscillation, ripple estimate and fit.
//!
//! Stages run in fixed order and the first failure aborts the call. Each
//! stage's covariance feeds the uncertainty used by the next one. With
//! `refine` set, a joint fit of all eight parameters replaces the staged
//! values and uncertainties.

use std::f64::consts::PI;

use tracing::debug;

use crate::domain::{EdgeFit, EdgeParams, EdgeProfile, FitConfig, RippleGuess, Stage};
use crate::error::FitError;
use crate::fit::amplitude::{estimate_amplitude_frequency, min_samples};
use crate::fit::baseline::{fit_baseline, measurement_sigma};
use crate::fit::macro_osc::{bulk_start, fit_macro};
use crate::fit::observer::{StageObserver, StageReport};
use crate::fit::phase::estimate_phase;
use crate::fit::residual::{baseline_residual, macro_residual};
use crate::fit::refine::{refine_edge, residual_after};
use crate::fit::ripple::{equivalent_seed, fit_ripple, resolve_bounds};
use crate::models::wrap_phase;

/// Fit one edge profile.
pub fn fit_edge(profile: &EdgeProfile, config: &FitConfig) -> Result<EdgeFit, FitError> {
    fit_edge_observed(profile, config, &mut ())
}

/// [`fit_edge`] with an observer called after every stage.
pub fn fit_edge_observed<O: StageObserver + ?Sized>(
    profile: &EdgeProfile,
    config: &FitConfig,
    observer: &mut O,
) -> Result<EdgeFit, FitError> {
    let needed = min_samples(config.smoothing_resolution);
    if profile.len() < needed {
        return Err(FitError::input_shape(
            Stage::Input,
            format!("profile has {} samples, need at least {needed}", profile.len()),
        ));
    }

    let sigma = measurement_sigma(profile, config)?;
    let baseline = fit_baseline(profile, &sigma, config)?;
    let residual = baseline_residual(profile, &baseline, sigma[0]);
    observer.on_stage(&StageReport::Baseline {
        fit: &baseline,
        residual: &residual,
    });

    let macro_fit = fit_macro(&residual, config)?;
    let second = macro_residual(&residual, &macro_fit);
    observer.on_stage(&StageReport::Macro {
        fit: &macro_fit,
        residual: &second,
    });

    let bulk = second.tail(bulk_start(second.len(), config.tip_divisor));
    if bulk.len() < needed {
        return Err(FitError::input_shape(
            Stage::Residual,
            format!("bulk region has {} samples, need at least {needed}", bulk.len()),
        ));
    }
    let bulk_dz = bulk.z()[1] - bulk.z()[0];

    let (seed, spread, estimated) = match config.ripple_seed {
        Some(seed) => {
            let span = bulk.z()[bulk.len() - 1] - bulk.z()[0];
            (seed, [bulk.sigma(), PI / span, bulk_dz], false)
        }
        None => {
            let af = estimate_amplitude_frequency(&bulk, config)?;
            let phase = estimate_phase(&second, af.frequency, config)?;
            observer.on_stage(&StageReport::Guess {
                amplitude_frequency: &af,
                phase,
            });
            let guess = RippleGuess {
                amplitude: af.amplitude,
                frequency: af.frequency,
                phase,
            };
            (guess, [af.amplitude_std, af.frequency_std, bulk_dz], true)
        }
    };
    debug!(?seed, ?spread, "ripple seed");

    let (ripple, ripple_unc) = if config.oscillation_fit {
        let bounds = resolve_bounds(profile, config)?;
        // Estimates may come out as an equivalent sinusoid outside the
        // bounds; a caller seed is checked as given.
        let seed = if estimated { equivalent_seed(&seed, &bounds) } else { seed };
        let fit = fit_ripple(&bulk, &seed, &bounds, config)?;
        let p = fit.params;
        let guess = RippleGuess {
            amplitude: p[0],
            frequency: p[1],
            phase: p[2],
        };
        (guess, [fit.std_error(0), fit.std_error(1), fit.std_error(2)])
    } else {
        (seed, spread)
    };
    observer.on_stage(&StageReport::Ripple {
        params: &ripple,
        uncertainties: &ripple_unc,
        bulk: &bulk,
        fitted: config.oscillation_fit,
    });

    let m = macro_fit.params;
    let staged = [
        ripple.amplitude,
        ripple.frequency,
        ripple.phase,
        baseline.params[0],
        m[0],
        m[1],
        m[2],
        m[3],
    ];
    let staged_unc = [
        ripple_unc[0],
        ripple_unc[1],
        ripple_unc[2],
        baseline.std_error(0),
        macro_fit.std_error(0),
        macro_fit.std_error(1),
        macro_fit.std_error(2),
        macro_fit.std_error(3),
    ];

    if !(config.oscillation_fit && config.refine) {
        return assemble(staged, staged_unc);
    }

    let start = normalize_params(staged);
    let refined = refine_edge(profile, &sigma, &start, config)?;
    let residual = residual_after(profile, &refined.params, sigma[0]);
    observer.on_stage(&StageReport::Refine {
        fit: &refined,
        residual: &residual,
    });
    assemble(refined.params, std::array::from_fn(|k| refined.std_error(k)))
}

/// Normalise both sinusoids of an `EdgeParams`-ordered vector.
fn normalize_params(p: [f64; 8]) -> EdgeParams {
    let (ra, rw, rphi) = normalize_sinusoid(p[0], p[1], p[2]);
    let (ma, mw, mphi) = normalize_sinusoid(p[4], p[5], p[6]);
    EdgeParams::from_array([ra, rw, rphi, p[3], ma, mw, mphi, p[7]])
}

fn assemble(params: [f64; 8], uncertainties: [f64; 8]) -> Result<EdgeFit, FitError> {
    let parameters = normalize_params(params);
    let uncertainties = EdgeParams::from_array(uncertainties);

    for (label, (&value, &err)) in EdgeParams::LABELS
        .iter()
        .zip(parameters.to_array().iter().zip(uncertainties.to_array().iter()))
    {
        if !value.is_finite() {
            return Err(FitError::convergence(Stage::Assembly, format!("{label} is not finite")));
        }
        if !(err.is_finite() && err >= 0.0) {
            return Err(FitError::convergence(
                Stage::Assembly,
                format!("uncertainty of {label} is not a finite non-negative value ({err})"),
            ));
        }
    }

    Ok(EdgeFit {
        parameters,
        uncertainties,
    })
}

/// Rewrite `A · sin(ω z + φ)` so that `ω ≥ 0`, `A ≥ 0` and `φ ∈ (−π, π]`.
///
/// The function of `z` is unchanged.
pub fn normalize_sinusoid(amplitude: f64, frequency: f64, phase: f64) -> (f64, f64, f64) {
    let (mut a, mut w, mut phi) = (amplitude, frequency, phase);
    if w < 0.0 {
        w = -w;
        phi = -phi;
        a = -a;
    }
    if a < 0.0 {
        a = -a;
        phi += PI;
    }
    (a, w, wrap_phase(phi))
}
