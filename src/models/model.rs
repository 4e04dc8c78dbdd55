//! Response models fitted by the edge pipeline.
//!
//! - `DistilledResponse`: ideal distilled-water growth shape, one parameter `a`
//! - `MacroSine`: `A · sin(ω z + φ) + C`
//! - `RippleSine`: `A · sin(ω z + φ)`
//! - `EdgeModel`: all three together, parameters in `EdgeParams` order
//!
//! Each implements [`ResponseModel`] so the bounded solver can stay generic.

use std::f64::consts::PI;

use crate::domain::EdgeParams;
use crate::math::ResponseModel;

/// Smallest value of `√(z/a) − 1` used in the derivative (the slope is
/// singular at `z = a`).
const DOMAIN_EPS: f64 = 1e-12;

/// `a · 4/3 · (s + 2) · √(s − 1)` with `s = √(z/a)`.
///
/// NaN when `z < a` (outside the model domain).
pub fn distilled_response(z: f64, a: f64) -> f64 {
    let s = (z / a).sqrt();
    a * (4.0 / 3.0) * (s + 2.0) * (s - 1.0).sqrt()
}

pub fn sinusoid(z: f64, amplitude: f64, frequency: f64, phase: f64) -> f64 {
    amplitude * (frequency * z + phase).sin()
}

/// Bring a phase into `(−π, π]`. Values already inside are returned as is.
pub fn wrap_phase(phi: f64) -> f64 {
    if phi > -PI && phi <= PI {
        return phi;
    }
    let p = phi.rem_euclid(2.0 * PI);
    if p > PI { p - 2.0 * PI } else { p }
}

/// Full three-component edge model for an assembled parameter vector.
pub fn edge_response(z: f64, p: &EdgeParams) -> f64 {
    distilled_response(z, p.scale)
        + sinusoid(z, p.macro_amplitude, p.macro_frequency, p.macro_phase)
        + p.offset
        + sinusoid(z, p.ripple_amplitude, p.ripple_frequency, p.ripple_phase)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DistilledResponse;

impl ResponseModel<1> for DistilledResponse {
    fn evaluate(&self, z: f64, params: &[f64; 1]) -> f64 {
        distilled_response(z, params[0])
    }

    fn jacobian_row(&self, z: f64, params: &[f64; 1]) -> [f64; 1] {
        [distilled_slope(z, params[0])]
    }
}

/// `∂ response / ∂a`.
fn distilled_slope(z: f64, a: f64) -> f64 {
    let s = (z / a).sqrt();
    let q = (s - 1.0).max(DOMAIN_EPS);
    let g = (s + 2.0) * q.sqrt();
    let dg = q.sqrt() + (s + 2.0) / (2.0 * q.sqrt());
    (4.0 / 3.0) * (g - 0.5 * s * dg)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MacroSine;

impl ResponseModel<4> for MacroSine {
    fn evaluate(&self, z: f64, p: &[f64; 4]) -> f64 {
        sinusoid(z, p[0], p[1], p[2]) + p[3]
    }

    fn jacobian_row(&self, z: f64, p: &[f64; 4]) -> [f64; 4] {
        let arg = p[1] * z + p[2];
        let (s, c) = arg.sin_cos();
        [s, p[0] * z * c, p[0] * c, 1.0]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RippleSine;

impl ResponseModel<3> for RippleSine {
    fn evaluate(&self, z: f64, p: &[f64; 3]) -> f64 {
        sinusoid(z, p[0], p[1], p[2])
    }

    fn jacobian_row(&self, z: f64, p: &[f64; 3]) -> [f64; 3] {
        let arg = p[1] * z + p[2];
        let (s, c) = arg.sin_cos();
        [s, p[0] * z * c, p[0] * c]
    }
}

/// Baseline, macro oscillation, offset and ripple as one model.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeModel;

impl ResponseModel<8> for EdgeModel {
    fn evaluate(&self, z: f64, p: &[f64; 8]) -> f64 {
        edge_response(z, &EdgeParams::from_array(*p))
    }

    fn jacobian_row(&self, z: f64, p: &[f64; 8]) -> [f64; 8] {
        let [rs, rw, rphi] = RippleSine.jacobian_row(z, &[p[0], p[1], p[2]]);
        let [ms, mw, mphi, dc] = MacroSine.jacobian_row(z, &[p[4], p[5], p[6], p[7]]);
        [rs, rw, rphi, distilled_slope(z, p[3]), ms, mw, mphi, dc]
    }
}
