//! Bounded Levenberg–Marquardt least squares.
//!
//! Generic over the parameter count `N`; every fitting stage of the edge
//! pipeline (1-parameter baseline, 4-parameter macro sinusoid, 3-parameter
//! ripple) goes through [`curve_fit`].
//!
//! Implementation notes:
//! - Residuals are weighted by `1 / sigma` per sample.
//! - Box bounds are handled with a simple active set: a parameter sitting on
//!   a bound whose gradient points outward is frozen for that step, and every
//!   trial point is clamped back into the box.
//! - The covariance is the pseudo-inverse of `JᵀJ` at the solution, optionally
//!   scaled by the reduced chi-square.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use super::ols::solve_least_squares;

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const DIAG_FLOOR: f64 = 1e-12;

/// Configuration for Levenberg–Marquardt optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of accepted-step iterations.
    pub max_iterations: usize,
    /// Stop when the relative cost reduction of a step falls below this.
    pub ftol: f64,
    /// Stop when the step norm falls below `xtol * (‖p‖ + xtol)`.
    pub xtol: f64,
    /// Stop when the largest free gradient component falls below this.
    pub gtol: f64,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor to increase lambda on a rejected step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on an accepted step.
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// Model that can be fit with [`curve_fit`].
pub trait ResponseModel<const N: usize> {
    /// Evaluate the model at `z`.
    fn evaluate(&self, z: f64, params: &[f64; N]) -> f64;

    /// Partial derivatives with respect to each parameter at `z`.
    fn jacobian_row(&self, z: f64, params: &[f64; N]) -> [f64; N];
}

/// Per-parameter box constraints. Use `±INFINITY` for an open side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<const N: usize> {
    pub lower: [f64; N],
    pub upper: [f64; N],
}

impl<const N: usize> Bounds<N> {
    pub fn new(lower: [f64; N], upper: [f64; N]) -> Self {
        Self { lower, upper }
    }

    pub fn unbounded() -> Self {
        Self {
            lower: [f64::NEG_INFINITY; N],
            upper: [f64::INFINITY; N],
        }
    }

    /// First parameter whose value lies outside its interval, if any.
    pub fn violation(&self, params: &[f64; N]) -> Option<usize> {
        (0..N).find(|&i| !(params[i] >= self.lower[i] && params[i] <= self.upper[i]))
    }

    pub fn clamp(&self, params: &mut [f64; N]) {
        for i in 0..N {
            params[i] = params[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    fn validate(&self) -> Result<(), LmError> {
        for i in 0..N {
            let (lower, upper) = (self.lower[i], self.upper[i]);
            if lower.is_nan() || upper.is_nan() || lower > upper {
                return Err(LmError::InvertedBounds { index: i, lower, upper });
            }
        }
        Ok(())
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CostTolerance,
    StepTolerance,
    GradientTolerance,
    /// Damping grew past its ceiling without finding a better point.
    Stalled,
}

/// Result of a converged fit.
#[derive(Debug, Clone, PartialEq)]
pub struct LmFit<const N: usize> {
    pub params: [f64; N],
    pub covariance: DMatrix<f64>,
    /// Weighted sum of squared residuals.
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LmError {
    #[error("need at least {needed} samples, got {got}")]
    TooFewSamples { needed: usize, got: usize },

    #[error("z, y and sigma differ in length ({z}, {y}, {sigma})")]
    LengthMismatch { z: usize, y: usize, sigma: usize },

    #[error("sigma must be finite and positive (index {index}: {value})")]
    InvalidSigma { index: usize, value: f64 },

    #[error("bounds of parameter {index} are invalid: [{lower}, {upper}]")]
    InvertedBounds { index: usize, lower: f64, upper: f64 },

    #[error("initial value {value} of parameter {index} outside [{lower}, {upper}]")]
    Infeasible {
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("cost is not finite at the initial guess")]
    NonFiniteStart,

    #[error("no convergence after {iterations} iterations (cost {cost:.6e})")]
    MaxIterations { iterations: usize, cost: f64 },

    #[error("covariance is not finite")]
    NonFiniteCovariance,
}

/// Fit `model` to `(z, y)` with per-sample errors `sigma`.
///
/// `absolute_sigma = false` rescales the covariance by `cost / (m − N)`.
#[allow(clippy::too_many_arguments)]
pub fn curve_fit<const N: usize, M: ResponseModel<N>>(
    model: &M,
    z: &[f64],
    y: &[f64],
    sigma: &[f64],
    initial: [f64; N],
    bounds: &Bounds<N>,
    absolute_sigma: bool,
    config: &LmConfig,
) -> Result<LmFit<N>, LmError> {
    let m = z.len();
    if y.len() != m || sigma.len() != m {
        return Err(LmError::LengthMismatch {
            z: m,
            y: y.len(),
            sigma: sigma.len(),
        });
    }
    if m < N {
        return Err(LmError::TooFewSamples { needed: N, got: m });
    }
    if let Some((index, &value)) = sigma.iter().enumerate().find(|(_, s)| !(s.is_finite() && **s > 0.0)) {
        return Err(LmError::InvalidSigma { index, value });
    }
    bounds.validate()?;
    if let Some(index) = bounds.violation(&initial) {
        return Err(LmError::Infeasible {
            index,
            value: initial[index],
            lower: bounds.lower[index],
            upper: bounds.upper[index],
        });
    }

    let mut params = initial;
    let mut cost = weighted_cost(model, z, y, sigma, &params);
    if !cost.is_finite() {
        return Err(LmError::NonFiniteStart);
    }
    let mut lambda = config.initial_lambda;

    for iter in 0..config.max_iterations {
        let (jtj, grad) = normal_equations(model, z, y, sigma, &params);
        let free = free_parameters(&params, &grad, bounds);

        let gnorm = (0..N)
            .filter(|&i| free[i])
            .map(|i| grad[i].abs())
            .fold(0.0, f64::max);
        if gnorm <= config.gtol {
            return finish(model, z, y, sigma, params, cost, iter, Termination::GradientTolerance, absolute_sigma);
        }

        let mut stop = None;
        loop {
            let Some(delta) = damped_step(&jtj, &grad, &free, lambda) else {
                lambda *= config.lambda_up;
                if lambda > LAMBDA_MAX {
                    stop = Some(Termination::Stalled);
                    break;
                }
                continue;
            };

            let mut candidate = params;
            for i in 0..N {
                candidate[i] += delta[i];
            }
            bounds.clamp(&mut candidate);
            let new_cost = weighted_cost(model, z, y, sigma, &candidate);

            if new_cost.is_finite() && new_cost < cost {
                let step = norm(&std::array::from_fn::<f64, N, _>(|i| candidate[i] - params[i]));
                let relative = (cost - new_cost) / cost;
                let scale = norm(&params);

                params = candidate;
                cost = new_cost;
                lambda = (lambda * config.lambda_down).max(LAMBDA_MIN);

                if relative <= config.ftol {
                    stop = Some(Termination::CostTolerance);
                } else if step <= config.xtol * (scale + config.xtol) {
                    stop = Some(Termination::StepTolerance);
                }
                break;
            }

            lambda *= config.lambda_up;
            if lambda > LAMBDA_MAX {
                stop = Some(Termination::Stalled);
                break;
            }
        }

        trace!(iteration = iter + 1, cost, lambda, "lm step");

        if let Some(termination) = stop {
            return finish(model, z, y, sigma, params, cost, iter + 1, termination, absolute_sigma);
        }
    }

    Err(LmError::MaxIterations {
        iterations: config.max_iterations,
        cost,
    })
}

/// Weighted sum of squared residuals.
pub fn weighted_cost<const N: usize, M: ResponseModel<N>>(
    model: &M,
    z: &[f64],
    y: &[f64],
    sigma: &[f64],
    params: &[f64; N],
) -> f64 {
    z.iter()
        .zip(y)
        .zip(sigma)
        .map(|((&zi, &yi), &si)| {
            let r = (yi - model.evaluate(zi, params)) / si;
            r * r
        })
        .sum()
}

/// `(JᵀJ, Jᵀr)` of the weighted problem, with `r = y − f`.
fn normal_equations<const N: usize, M: ResponseModel<N>>(
    model: &M,
    z: &[f64],
    y: &[f64],
    sigma: &[f64],
    params: &[f64; N],
) -> (DMatrix<f64>, DVector<f64>) {
    let mut jtj = DMatrix::<f64>::zeros(N, N);
    let mut grad = DVector::<f64>::zeros(N);

    for ((&zi, &yi), &si) in z.iter().zip(y).zip(sigma) {
        let row = model.jacobian_row(zi, params);
        let r = (yi - model.evaluate(zi, params)) / si;
        for a in 0..N {
            let ja = row[a] / si;
            grad[a] += ja * r;
            for b in 0..N {
                jtj[(a, b)] += ja * row[b] / si;
            }
        }
    }
    (jtj, grad)
}

/// Parameters allowed to move this step.
fn free_parameters<const N: usize>(params: &[f64; N], grad: &DVector<f64>, bounds: &Bounds<N>) -> [bool; N] {
    std::array::from_fn(|i| {
        let (lower, upper) = (bounds.lower[i], bounds.upper[i]);
        if lower == upper {
            return false;
        }
        let pinned_low = params[i] <= lower && grad[i] < 0.0;
        let pinned_high = params[i] >= upper && grad[i] > 0.0;
        !(pinned_low || pinned_high)
    })
}

fn damped_step<const N: usize>(
    jtj: &DMatrix<f64>,
    grad: &DVector<f64>,
    free: &[bool; N],
    lambda: f64,
) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    let mut b = grad.clone();
    for i in 0..N {
        if free[i] {
            a[(i, i)] += lambda * a[(i, i)].max(DIAG_FLOOR);
        } else {
            for j in 0..N {
                a[(i, j)] = 0.0;
                a[(j, i)] = 0.0;
            }
            a[(i, i)] = 1.0;
            b[i] = 0.0;
        }
    }
    solve_least_squares(&a, &b)
}

#[allow(clippy::too_many_arguments)]
fn finish<const N: usize, M: ResponseModel<N>>(
    model: &M,
    z: &[f64],
    y: &[f64],
    sigma: &[f64],
    params: [f64; N],
    cost: f64,
    iterations: usize,
    termination: Termination,
    absolute_sigma: bool,
) -> Result<LmFit<N>, LmError> {
    let (jtj, _) = normal_equations(model, z, y, sigma, &params);
    let mut covariance = pseudo_inverse(jtj, z.len())?;

    if !absolute_sigma {
        let dof = z.len().saturating_sub(N);
        if dof == 0 {
            return Err(LmError::NonFiniteCovariance);
        }
        covariance *= cost / dof as f64;
    }
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(LmError::NonFiniteCovariance);
    }

    trace!(iterations, cost, ?termination, "lm converged");
    Ok(LmFit {
        params,
        covariance,
        cost,
        iterations,
        termination,
    })
}

/// SVD pseudo-inverse with a relative singular-value cutoff.
fn pseudo_inverse(matrix: DMatrix<f64>, samples: usize) -> Result<DMatrix<f64>, LmError> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(LmError::NonFiniteCovariance);
    }
    let dim = matrix.nrows();
    let svd = matrix.svd(true, true);
    let largest = svd.singular_values.max();
    let cutoff = f64::EPSILON * samples.max(dim) as f64 * largest;
    svd.pseudo_inverse(cutoff)
        .map_err(|_| LmError::NonFiniteCovariance)
}

fn norm<const N: usize>(v: &[f64; N]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
