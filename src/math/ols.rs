//! Small dense least-squares solves.
//!
//! Two callers need this:
//! - the damped normal equations inside each Levenberg–Marquardt step
//! - the straight-line fit of a curved icicle spine
//!
//! Implementation choices:
//! - We use SVD so the same routine handles square systems and tall design
//!   matrices (more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter counts are tiny (1–4 columns), so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` for non-finite input or a system too ill-conditioned to
/// solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Least-squares line `y = intercept + slope * x`.
///
/// Returns `(intercept, slope)`, or `None` for fewer than two points or a
/// degenerate x range.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mut design = DMatrix::<f64>::zeros(x.len(), 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xi;
    }
    let beta = solve_least_squares(&design, &DVector::from_column_slice(y))?;
    Some((beta[0], beta[1]))
}
