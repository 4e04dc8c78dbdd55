//! Stage 2: fit one large-scale sinusoid plus offset to the baseline residual.
//!
//! Guesses come from the residual itself; the bounds are a fixed band around
//! each guess. The phase guess puts the crest of the seed sinusoid on the
//! residual maximum.

use std::f64::consts::PI;

use tracing::debug;

use crate::domain::{FitConfig, MacroFrequencySeed, ResidualSeries, Stage, StageFit};
use crate::error::FitError;
use crate::math::{argmax, curve_fit, min_max, Bounds};
use crate::models::{wrap_phase, MacroSine};

/// Initial guess and bounds for `[A, ω, φ, C]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroGuess {
    pub params: [f64; 4],
    pub bounds: Bounds<4>,
}

pub fn macro_guess(residual: &ResidualSeries, seed: MacroFrequencySeed) -> Result<MacroGuess, FitError> {
    let values = residual.values();
    let z = residual.z();
    let (Some((lo, hi)), Some(peak)) = (min_max(values), argmax(values)) else {
        return Err(FitError::input_shape(Stage::Macro, "empty residual"));
    };
    let n = values.len() as f64;

    let amplitude = (hi - lo) / 2.0;
    let frequency = match seed {
        MacroFrequencySeed::SampleCount => 2.0 * PI / n,
        MacroFrequencySeed::ProfileLength => 2.0 * PI / (z[z.len() - 1] - z[0]),
    };
    let phase = wrap_phase(PI / 2.0 - frequency * z[peak]);
    let offset = values[0];

    let (c_lo, c_hi) = ordered(offset / 3.0, offset * 3.0);
    let bounds = Bounds::new(
        [amplitude / 2.0, frequency / 2.0, -n, c_lo],
        [amplitude * 1.5, frequency * 2.0, n, c_hi],
    );

    Ok(MacroGuess {
        params: [amplitude, frequency, phase, offset],
        bounds,
    })
}

/// Fit `A · sin(ω z + φ) + C` to the baseline residual.
pub fn fit_macro(residual: &ResidualSeries, config: &FitConfig) -> Result<StageFit<4>, FitError> {
    let guess = macro_guess(residual, config.macro_frequency_seed)?;
    if let Some(i) = guess.bounds.violation(&guess.params) {
        return Err(FitError::bounds(
            Stage::Macro,
            format!(
                "guess {} = {} outside [{}, {}]",
                MACRO_LABELS[i], guess.params[i], guess.bounds.lower[i], guess.bounds.upper[i]
            ),
        ));
    }
    debug!(guess = ?guess.params, "macro guess");

    let sigma = vec![residual.sigma(); residual.len()];
    let fit = curve_fit(
        &MacroSine,
        residual.z(),
        residual.values(),
        &sigma,
        guess.params,
        &guess.bounds,
        config.absolute_sigma,
        &config.solver,
    )
    .map_err(|e| FitError::solver(Stage::Macro, e))?;

    debug!(params = ?fit.params, iterations = fit.iterations, "macro fitted");

    Ok(StageFit {
        params: fit.params,
        covariance: fit.covariance,
    })
}

/// First index of the bulk region: `len / tip_divisor`.
pub fn bulk_start(len: usize, tip_divisor: usize) -> usize {
    len.checked_div(tip_divisor).unwrap_or(0)
}

const MACRO_LABELS: [&str; 4] = ["A", "w", "phi", "C"];

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(f: impl Fn(f64) -> f64) -> ResidualSeries {
        let z: Vec<f64> = (0..200).map(|i| 1.0 + 9.0 * i as f64 / 199.0).collect();
        let v = z.iter().map(|&x| f(x)).collect();
        ResidualSeries::new(z, v, 0.05)
    }

    #[test]
    fn guess_follows_residual_shape() {
        let r = series(|z| 0.2 * (0.6 * z).sin() + 0.1);
        let g = macro_guess(&r, MacroFrequencySeed::SampleCount).unwrap();
        assert_relative_eq!(g.params[1], 2.0 * PI / 200.0);
        assert_relative_eq!(g.params[3], r.values()[0]);
        assert!(g.bounds.violation(&g.params).is_none());
        let crest = r.z()[argmax(r.values()).unwrap()];
        assert_relative_eq!((g.params[1] * crest + g.params[2]).sin(), 1.0, epsilon = 1e-12);

        let g = macro_guess(&r, MacroFrequencySeed::ProfileLength).unwrap();
        assert_relative_eq!(g.params[1], 2.0 * PI / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn negative_offset_bounds_are_ordered() {
        let r = series(|z| 0.2 * (0.6 * z).sin() - 0.5);
        let g = macro_guess(&r, MacroFrequencySeed::SampleCount).unwrap();
        assert!(g.bounds.lower[3] < g.bounds.upper[3]);
        assert!(g.bounds.violation(&g.params).is_none());
    }

    #[test]
    fn fits_single_period_sine() {
        let r = series(|z| 0.15 * (0.7 * z + 0.9).sin() + 0.2);
        let cfg = FitConfig {
            macro_frequency_seed: MacroFrequencySeed::ProfileLength,
            ..FitConfig::default()
        };
        let fit = fit_macro(&r, &cfg).unwrap();
        let model = |z: f64| fit.params[0] * (fit.params[1] * z + fit.params[2]).sin() + fit.params[3];
        let rms = (r
            .z()
            .iter()
            .zip(r.values())
            .map(|(&z, &v)| (v - model(z)).powi(2))
            .sum::<f64>()
            / r.len() as f64)
            .sqrt();
        assert!(rms < 0.05, "rms {rms}");
    }

    #[test]
    fn bulk_starts_after_tip() {
        assert_eq!(bulk_start(200, 5), 40);
        assert_eq!(bulk_start(7, 5), 1);
        assert_eq!(bulk_start(7, 0), 0);
    }
}
