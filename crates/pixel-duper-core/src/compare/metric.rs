//! Distances between luma grids, as percentages of full scale.

use crate::pixels::PixelFingerprint;

const FULL_SCALE: f64 = 255.0;
const SSIM_C1: f64 = (0.01 * FULL_SCALE) * (0.01 * FULL_SCALE);
const SSIM_C2: f64 = (0.03 * FULL_SCALE) * (0.03 * FULL_SCALE);

/// Mean absolute difference of two equally sized grids.
pub fn mean_absolute(a: &[u8], b: &[u8]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let sum: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    sum as f64 / a.len() as f64 / FULL_SCALE * 100.0
}

/// Root-mean-square difference of two equally sized grids.
pub fn root_mean_square(a: &[u8], b: &[u8]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let sum: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x.abs_diff(y) as u64;
            d * d
        })
        .sum();
    (sum as f64 / a.len() as f64).sqrt() / FULL_SCALE * 100.0
}

/// Structural dissimilarity `(1 - ssim) * 100` of `a.main` against
/// `b_main`, which is `b.main` already put in the orientation being tested.
/// Orientation does not change `b`'s average or variance.
pub fn structural_difference(a: &PixelFingerprint, b: &PixelFingerprint, b_main: &[u8]) -> f64 {
    let a_main = a.main();
    debug_assert_eq!(a_main.len(), b_main.len());
    if a_main.is_empty() {
        return 0.0;
    }
    let n = a_main.len() as f64;
    let cross: u64 = a_main
        .iter()
        .zip(b_main)
        .map(|(&x, &y)| x as u64 * y as u64)
        .sum();

    let (mean_a, mean_b) = (a.average() as f64, b.average() as f64);
    let (var_a, var_b) = (a.variance_square() as f64, b.variance_square() as f64);
    let covariance = cross as f64 / n - mean_a * mean_b;

    let luminance = (2.0 * mean_a * mean_b + SSIM_C1) / (mean_a * mean_a + mean_b * mean_b + SSIM_C1);
    let structure = (2.0 * covariance + SSIM_C2) / (var_a + var_b + SSIM_C2);
    let ssim = luminance * structure;
    ((1.0 - ssim) * 100.0).clamp(0.0, 200.0)
}
