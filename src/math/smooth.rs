//! One-dimensional Gaussian smoothing.
//!
//! Boundary handling mirrors the usual "reflect" convention
//! (`d c b a | a b c d | d c b a`): the edge sample is repeated once.
//! The kernel is truncated at `4σ`.

/// Kernel half-width in units of sigma.
const TRUNCATE: f64 = 4.0;

/// Smooth `values` with a Gaussian of standard deviation `sigma` samples.
///
/// A non-positive or non-finite `sigma` returns the input unchanged.
pub fn gaussian_smooth(values: &[f64], sigma: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 || !(sigma.is_finite() && sigma > 0.0) {
        return values.to_vec();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| w * values[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Normalised kernel of length `2r + 1`, `r = round(4σ)`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|k| {
            let x = k as f64 / sigma;
            (-0.5 * x * x).exp()
        })
        .collect();
    let total: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= total;
    }
    kernel
}

/// Map any index onto `0..n` by repeated mirror reflection.
fn reflect_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let k = i.rem_euclid(period);
    if k >= n as isize {
        (period - 1 - k) as usize
    } else {
        k as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reflect_repeats_edge_sample() {
        assert_eq!(reflect_index(-1, 5), 0);
        assert_eq!(reflect_index(-2, 5), 1);
        assert_eq!(reflect_index(5, 5), 4);
        assert_eq!(reflect_index(6, 5), 3);
        assert_eq!(reflect_index(12, 5), 2);
    }

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let k = gaussian_kernel(3.0);
        assert_eq!(k.len(), 25);
        assert_relative_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for i in 0..k.len() / 2 {
            assert_relative_eq!(k[i], k[k.len() - 1 - i], epsilon = 1e-15);
        }
    }

    #[test]
    fn constant_signal_is_unchanged() {
        let v = vec![2.5; 40];
        for s in gaussian_smooth(&v, 15.0) {
            assert_relative_eq!(s, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn smoothing_attenuates_fast_oscillation() {
        let v: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let s = gaussian_smooth(&v, 3.0);
        assert!(s[100].abs() < 1e-3);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let v = vec![1.0, 4.0, 2.0];
        assert_eq!(gaussian_smooth(&v, 0.0), v);
    }
}
