//! No-reference image quality scores. Both scores range over `0..=100`.

/// Edge of the block grid used by DCT-based codecs.
const BLOCK: usize = 8;
/// Width of the low-pass filter used by the blur estimate.
const BLUR_KERNEL: usize = 9;

/// Compression blockiness: how much stronger luminance steps are across
/// 8-pixel block boundaries than inside blocks.
pub fn blockiness(luma: &[u8], width: usize, height: usize) -> f64 {
    if width < 2 * BLOCK || height < 2 * BLOCK {
        return 0.0;
    }
    let horizontal = boundary_excess(width, height, |x, y| {
        abs_diff(luma[y * width + x], luma[y * width + x - 1])
    });
    let vertical = boundary_excess(height, width, |y, x| {
        abs_diff(luma[y * width + x], luma[(y - 1) * width + x])
    });
    (horizontal + vertical) / 2.0
}

/// `along` is the axis the steps are measured on, `across` the other one.
fn boundary_excess(along: usize, across: usize, step: impl Fn(usize, usize) -> u32) -> f64 {
    let (mut boundary_sum, mut boundary_n) = (0u64, 0u64);
    let (mut inner_sum, mut inner_n) = (0u64, 0u64);
    for j in 0..across {
        for i in 1..along {
            let d = step(i, j) as u64;
            if i % BLOCK == 0 {
                boundary_sum += d;
                boundary_n += 1;
            } else {
                inner_sum += d;
                inner_n += 1;
            }
        }
    }
    if boundary_n == 0 || inner_n == 0 {
        return 0.0;
    }
    let boundary = boundary_sum as f64 / boundary_n as f64;
    let inner = inner_sum as f64 / inner_n as f64;
    if boundary <= inner {
        return 0.0;
    }
    ((boundary - inner) / (boundary + inner + 1.0) * 100.0).min(100.0)
}

/// Blur estimate after Crété-Roffet et al.: the share of local variation
/// that survives a strong low-pass filter. A sharp image loses most of its
/// variation when blurred, a blurry one barely changes. Flat images score 0.
pub fn blurring(luma: &[u8], width: usize, height: usize) -> f64 {
    if width < BLUR_KERNEL || height < BLUR_KERNEL {
        return 0.0;
    }
    let horizontal = blur_along(width, height, |x, y| luma[y * width + x]);
    let vertical = blur_along(height, width, |y, x| luma[y * width + x]);
    horizontal.max(vertical) * 100.0
}

fn blur_along(along: usize, across: usize, at: impl Fn(usize, usize) -> u8) -> f64 {
    let half = BLUR_KERNEL / 2;
    let mut original_variation = 0u64;
    let mut lost_variation = 0u64;
    let mut line = vec![0u32; along];
    let mut blurred = vec![0u32; along];

    for j in 0..across {
        for (i, v) in line.iter_mut().enumerate() {
            *v = at(i, j) as u32;
        }
        // box filter scaled by the kernel width to stay in integers
        for (i, b) in blurred.iter_mut().enumerate() {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(along - 1);
            let sum: u32 = line[lo..=hi].iter().sum();
            *b = sum * BLUR_KERNEL as u32 / (hi - lo + 1) as u32;
        }
        for i in 1..along {
            let d_original = line[i].abs_diff(line[i - 1]) * BLUR_KERNEL as u32;
            let d_blurred = blurred[i].abs_diff(blurred[i - 1]);
            original_variation += d_original as u64;
            lost_variation += d_original.saturating_sub(d_blurred) as u64;
        }
    }
    if original_variation == 0 {
        return 0.0;
    }
    (original_variation - lost_variation) as f64 / original_variation as f64
}

fn abs_diff(a: u8, b: u8) -> u32 {
    a.abs_diff(b) as u32
}
