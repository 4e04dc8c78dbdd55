//! Shared domain types.
//!
//! This module defines:
//!
//! - the validated input profile (`EdgeProfile`)
//! - per-stage fit outputs (`StageFit`, `ResidualSeries`)
//! - the assembled 8-element result (`EdgeParams`, `EdgeFit`)
//! - the per-call configuration (`FitConfig`)

use std::f64::consts::PI;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::math::{Bounds, LmConfig};

/// Pipeline stage, used to attribute errors and observer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    Baseline,
    Residual,
    Macro,
    AmplitudeFrequency,
    Phase,
    Ripple,
    Refine,
    Assembly,
}

impl Stage {
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Baseline => "baseline fit",
            Stage::Residual => "residual",
            Stage::Macro => "macro fit",
            Stage::AmplitudeFrequency => "amplitude/frequency estimate",
            Stage::Phase => "phase estimate",
            Stage::Ripple => "ripple fit",
            Stage::Refine => "joint refinement",
            Stage::Assembly => "assembly",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Measured edge positions along the icicle axis.
///
/// `z = 0` is the tip; samples are ordered tip to base with strictly
/// increasing, strictly positive `z`.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeProfile {
    z: Vec<f64>,
    position: Vec<f64>,
}

impl EdgeProfile {
    pub fn new(z: Vec<f64>, position: Vec<f64>) -> Result<Self, FitError> {
        if z.len() != position.len() {
            return Err(FitError::input_shape(
                Stage::Input,
                format!("z has {} samples but position has {}", z.len(), position.len()),
            ));
        }
        if z.len() < 2 {
            return Err(FitError::input_shape(
                Stage::Input,
                format!("profile needs at least 2 samples, got {}", z.len()),
            ));
        }
        if z.iter().chain(position.iter()).any(|v| !v.is_finite()) {
            return Err(FitError::input_shape(Stage::Input, "profile contains non-finite values"));
        }
        if z[0] <= 0.0 {
            return Err(FitError::input_shape(
                Stage::Input,
                format!("z must be strictly positive, first sample is {}", z[0]),
            ));
        }
        if let Some(i) = z.windows(2).position(|w| w[1] <= w[0]) {
            return Err(FitError::input_shape(
                Stage::Input,
                format!("z must be strictly increasing (index {})", i + 1),
            ));
        }
        Ok(Self { z, position })
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    /// Spacing between the first two samples.
    pub fn sampling_interval(&self) -> f64 {
        (self.z[1] - self.z[0]).abs()
    }

    pub fn z_min(&self) -> f64 {
        self.z[0]
    }

    pub fn max_position(&self) -> f64 {
        self.position.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Coefficients and covariance produced by one fitting stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFit<const N: usize> {
    pub params: [f64; N],
    pub covariance: DMatrix<f64>,
}

impl<const N: usize> StageFit<N> {
    pub fn variance(&self, i: usize) -> f64 {
        self.covariance[(i, i)]
    }

    /// Square root of the covariance diagonal entry (clamped at zero).
    pub fn std_error(&self, i: usize) -> f64 {
        self.variance(i).max(0.0).sqrt()
    }
}

/// Signal left after removing a fitted model component.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualSeries {
    z: Vec<f64>,
    values: Vec<f64>,
    /// Propagated uncertainty, uniform across samples.
    sigma: f64,
}

impl ResidualSeries {
    pub fn new(z: Vec<f64>, values: Vec<f64>, sigma: f64) -> Self {
        debug_assert_eq!(z.len(), values.len());
        Self { z, values, sigma }
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Samples from `start` to the end, with the same sigma.
    pub fn tail(&self, start: usize) -> Self {
        let start = start.min(self.len());
        Self {
            z: self.z[start..].to_vec(),
            values: self.values[start..].to_vec(),
            sigma: self.sigma,
        }
    }
}

/// Sign of the second derivative at a critical point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curvature {
    Concave,
    Convex,
    Flat,
}

impl Curvature {
    pub fn from_second_derivative(value: f64) -> Self {
        if value < 0.0 {
            Curvature::Concave
        } else if value > 0.0 {
            Curvature::Convex
        } else {
            Curvature::Flat
        }
    }

    /// True for one concave and one convex point (half a period apart).
    pub fn opposes(self, other: Curvature) -> bool {
        matches!(
            (self, other),
            (Curvature::Concave, Curvature::Convex) | (Curvature::Convex, Curvature::Concave)
        )
    }
}

/// Candidate extremum found on a smoothed residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalPoint {
    pub index: usize,
    pub gradient: f64,
    pub curvature: Curvature,
}

/// Ripple parameters `[A, ω, φ]`, used both as a caller seed and as the
/// estimators' guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RippleGuess {
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
}

impl RippleGuess {
    pub fn to_array(self) -> [f64; 3] {
        [self.amplitude, self.frequency, self.phase]
    }
}

/// Explicit bounds for the ripple fit, one `(lower, upper)` pair per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RippleBounds {
    pub amplitude: (f64, f64),
    pub frequency: (f64, f64),
    pub phase: (f64, f64),
}

impl RippleBounds {
    /// Reference bounds: `A ∈ ±max(response)`, `ω ∈ [0, N/10]`, `φ ∈ [−π/2, π/2]`.
    pub fn reference(profile: &EdgeProfile) -> Self {
        let max_response = profile.max_position();
        Self {
            amplitude: (-max_response, max_response),
            frequency: (0.0, profile.len() as f64 / 10.0),
            phase: (-PI / 2.0, PI / 2.0),
        }
    }

    pub fn to_bounds(self) -> Bounds<3> {
        Bounds::new(
            [self.amplitude.0, self.frequency.0, self.phase.0],
            [self.amplitude.1, self.frequency.1, self.phase.1],
        )
    }
}

/// Measurement error on the edge positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementError {
    /// Same error for every sample.
    Uniform(f64),
    /// One error per sample.
    PerSample(Vec<f64>),
}

/// How the macro-oscillation frequency guess is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MacroFrequencySeed {
    /// `2π / N`, with `N` the number of samples.
    SampleCount,
    /// `2π / (z_max − z_min)`: one period over the profile.
    ProfileLength,
}

/// Per-call configuration of the edge fit.
///
/// Built once per call and never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Measurement error; defaults to half the first z-sampling interval.
    pub measurement_error: Option<MeasurementError>,
    /// Treat sigmas as absolute (true) or scale the covariance by the
    /// reduced chi-square (false).
    pub absolute_sigma: bool,
    /// Explicit ripple seed; skips the amplitude/frequency and phase estimators.
    pub ripple_seed: Option<RippleGuess>,
    /// Explicit ripple bounds; defaults to `RippleBounds::reference`.
    pub ripple_bounds: Option<RippleBounds>,
    /// Gradient magnitude below which a sample may be a critical point.
    pub amplitude_threshold: f64,
    /// Gaussian smoothing width (samples) of the amplitude/frequency estimator.
    pub smoothing_resolution: usize,
    /// Number of critical-point pairs to average over.
    pub iteration_cap: usize,
    /// Keep pairing critical points to the end of the bulk region.
    pub full_scan: bool,
    /// Run the final ripple fit (true) or return the guesses (false).
    pub oscillation_fit: bool,
    /// After the ripple fit, refit all eight parameters together over the
    /// whole profile, starting from the staged values.
    pub refine: bool,
    /// Initial guess of the baseline scale factor `a`.
    pub baseline_seed: f64,
    /// Gaussian smoothing width (samples) of the phase estimator.
    pub phase_smoothing: f64,
    /// The first `len / tip_divisor` samples are excluded from the bulk region.
    pub tip_divisor: usize,
    pub macro_frequency_seed: MacroFrequencySeed,
    pub solver: LmConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            measurement_error: None,
            absolute_sigma: true,
            ripple_seed: None,
            ripple_bounds: None,
            amplitude_threshold: 0.01,
            smoothing_resolution: 3,
            iteration_cap: 4,
            full_scan: false,
            oscillation_fit: true,
            refine: false,
            baseline_seed: 0.01,
            phase_smoothing: 15.0,
            tip_divisor: 5,
            macro_frequency_seed: MacroFrequencySeed::SampleCount,
            solver: LmConfig::default(),
        }
    }
}

/// Named view of the 8-element parameter (or uncertainty) vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    pub ripple_amplitude: f64,
    pub ripple_frequency: f64,
    pub ripple_phase: f64,
    pub scale: f64,
    pub macro_amplitude: f64,
    pub macro_frequency: f64,
    pub macro_phase: f64,
    pub offset: f64,
}

impl EdgeParams {
    pub const LABELS: [&'static str; 8] = [
        "A_ripple", "w_ripple", "phi_ripple", "a_scale", "A_macro", "w_macro", "phi_macro", "C_offset",
    ];

    /// `[A_ripple, ω_ripple, φ_ripple, a_scale, A_macro, ω_macro, φ_macro, C_offset]`
    pub fn to_array(&self) -> [f64; 8] {
        [
            self.ripple_amplitude,
            self.ripple_frequency,
            self.ripple_phase,
            self.scale,
            self.macro_amplitude,
            self.macro_frequency,
            self.macro_phase,
            self.offset,
        ]
    }

    pub fn from_array(v: [f64; 8]) -> Self {
        Self {
            ripple_amplitude: v[0],
            ripple_frequency: v[1],
            ripple_phase: v[2],
            scale: v[3],
            macro_amplitude: v[4],
            macro_frequency: v[5],
            macro_phase: v[6],
            offset: v[7],
        }
    }

    pub fn ripple(&self) -> RippleGuess {
        RippleGuess {
            amplitude: self.ripple_amplitude,
            frequency: self.ripple_frequency,
            phase: self.ripple_phase,
        }
    }
}

/// Parameters and uncertainties of one fitted edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeFit {
    pub parameters: EdgeParams,
    pub uncertainties: EdgeParams,
}

/// Which edge of the icicle a profile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSide {
    Left,
    Right,
}

impl EdgeSide {
    pub fn display_name(self) -> &'static str {
        match self {
            EdgeSide::Left => "left",
            EdgeSide::Right => "right",
        }
    }
}

/// Fits of both edges of one icicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IcicleFit {
    pub left: EdgeFit,
    pub right: EdgeFit,
    /// Largest z of the profiles, in physical length units.
    pub length: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_rejects_length_mismatch() {
        let err = EdgeProfile::new(vec![1.0, 2.0, 3.0], vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, FitError::InputShape { stage: Stage::Input, .. }));
    }

    #[test]
    fn profile_rejects_non_increasing_z() {
        let err = EdgeProfile::new(vec![1.0, 2.0, 2.0], vec![0.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, FitError::InputShape { .. }));
        let err = EdgeProfile::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, FitError::InputShape { .. }));
    }

    #[test]
    fn residual_tail_truncates_both_axes() {
        let r = ResidualSeries::new(vec![1.0, 2.0, 3.0, 4.0], vec![0.1, 0.2, 0.3, 0.4], 0.5);
        let bulk = r.tail(1);
        assert_eq!(bulk.z(), &[2.0, 3.0, 4.0]);
        assert_eq!(bulk.values(), &[0.2, 0.3, 0.4]);
        assert_eq!(bulk.sigma(), 0.5);
    }

    #[test]
    fn edge_params_array_order() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let p = EdgeParams::from_array(v);
        assert_eq!(p.scale, 4.0);
        assert_eq!(p.offset, 8.0);
        assert_eq!(p.to_array(), v);
    }

    #[test]
    fn curvature_pairs_only_opposite_signs() {
        assert!(Curvature::Concave.opposes(Curvature::Convex));
        assert!(!Curvature::Concave.opposes(Curvature::Concave));
        assert!(!Curvature::Flat.opposes(Curvature::Convex));
    }

    #[test]
    fn partial_config_json_keeps_defaults() {
        let cfg: FitConfig = serde_json::from_str(r#"{ "amplitude_threshold": 0.03, "full_scan": true }"#).unwrap();
        assert_eq!(cfg.amplitude_threshold, 0.03);
        assert!(cfg.full_scan);
        assert_eq!(cfg.smoothing_resolution, 3);
        assert_eq!(cfg.macro_frequency_seed, MacroFrequencySeed::SampleCount);
    }
}
