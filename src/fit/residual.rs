//! Residuals between the measured edge and a fitted component.
//!
//! Uncertainty is propagated as a single root-sum-of-squares value and
//! broadcast to every sample.

use crate::domain::{EdgeProfile, ResidualSeries, StageFit};
use crate::math::ResponseModel;
use crate::models::{distilled_response, MacroSine};

/// `response − baseline(z; a)`, with sigma `sqrt(e0² + var(a)²)`.
///
/// `e0` is the measurement error of the first sample.
pub fn baseline_residual(profile: &EdgeProfile, baseline: &StageFit<1>, e0: f64) -> ResidualSeries {
    let a = baseline.params[0];
    let values = profile
        .z()
        .iter()
        .zip(profile.position())
        .map(|(&z, &r)| r - distilled_response(z, a))
        .collect();
    let sigma = root_sum_square(e0, &[baseline.variance(0)]);
    ResidualSeries::new(profile.z().to_vec(), values, sigma)
}

/// `residual − macro(z)`, with sigma `sqrt(e1² + Σ var_k²)` over the macro
/// parameter variances.
pub fn macro_residual(residual: &ResidualSeries, macro_fit: &StageFit<4>) -> ResidualSeries {
    let values = residual
        .z()
        .iter()
        .zip(residual.values())
        .map(|(&z, &r)| r - MacroSine.evaluate(z, &macro_fit.params))
        .collect();
    let variances: Vec<f64> = (0..4).map(|k| macro_fit.variance(k)).collect();
    let sigma = root_sum_square(residual.sigma(), &variances);
    ResidualSeries::new(residual.z().to_vec(), values, sigma)
}

fn root_sum_square(base: f64, terms: &[f64]) -> f64 {
    (base * base + terms.iter().map(|t| t * t).sum::<f64>()).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn baseline_residual_removes_model() {
        let z = vec![1.0, 2.0, 3.0];
        let r: Vec<f64> = z.iter().map(|&v| distilled_response(v, 0.5) + 0.25).collect();
        let profile = EdgeProfile::new(z, r).unwrap();
        let fit = StageFit {
            params: [0.5],
            covariance: DMatrix::from_element(1, 1, 0.04),
        };
        let res = baseline_residual(&profile, &fit, 0.03);
        for v in res.values() {
            assert_relative_eq!(*v, 0.25, epsilon = 1e-12);
        }
        // sqrt(0.03² + 0.04²)
        assert_relative_eq!(res.sigma(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn macro_residual_sums_all_variances() {
        let z = vec![1.0, 2.0];
        let series = ResidualSeries::new(z.clone(), vec![1.0, 1.0], 0.1);
        let mut cov = DMatrix::zeros(4, 4);
        for k in 0..4 {
            cov[(k, k)] = 0.1;
        }
        let fit = StageFit {
            params: [0.0, 1.0, 0.0, 1.0],
            covariance: cov,
        };
        let res = macro_residual(&series, &fit);
        assert_eq!(res.values(), &[0.0, 0.0]);
        assert_relative_eq!(res.sigma(), (0.01f64 + 4.0 * 0.01).sqrt(), epsilon = 1e-12);
    }
}
