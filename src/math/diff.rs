//! Finite-difference derivatives on a (possibly non-uniform) grid.

/// First derivative of `f` sampled at `z`.
///
/// Interior points use the second-order non-uniform central formula; the two
/// ends use first-order one-sided differences.
///
/// # Panics
/// Panics if `f` and `z` differ in length or have fewer than 2 samples.
pub fn gradient(f: &[f64], z: &[f64]) -> Vec<f64> {
    let n = f.len();
    assert_eq!(n, z.len(), "gradient: value/grid length mismatch");
    assert!(n >= 2, "gradient: need at least 2 samples");

    let mut out = vec![0.0; n];
    out[0] = (f[1] - f[0]) / (z[1] - z[0]);
    out[n - 1] = (f[n - 1] - f[n - 2]) / (z[n - 1] - z[n - 2]);

    for i in 1..n - 1 {
        let hs = z[i] - z[i - 1];
        let hd = z[i + 1] - z[i];
        out[i] = (hs * hs * f[i + 1] + (hd * hd - hs * hs) * f[i] - hd * hd * f[i - 1])
            / (hs * hd * (hd + hs));
    }
    out
}
