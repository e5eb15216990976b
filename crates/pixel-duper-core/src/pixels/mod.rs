mod buffer;
mod transform;

pub use buffer::{resample_luma, CanonicalPixelBuffer, PixelData};
pub use transform::Transform;

use transform::{mirror_grid, turn_grid};

/// Edge of the coarse thumbnail grid.
pub const FAST_SIDE: usize = 4;
const FAST_LEN: usize = FAST_SIDE * FAST_SIDE;

/// Visual signature of one image at one resolution.
///
/// `fast` (4×4) and `main` (`side×side`) live in a single owned buffer, fast
/// grid first. `average` and `variance_square` describe `main` and are only
/// meaningful once `filled` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFingerprint {
    side: usize,
    data: Box<[u8]>,
    average: f32,
    variance_square: f32,
    filled: bool,
}

impl PixelFingerprint {
    /// Empty, all-zero fingerprint. `side` below the fast grid edge is a
    /// programming error.
    pub fn new(side: usize) -> Self {
        assert!(side >= FAST_SIDE, "fingerprint side {} is below {}", side, FAST_SIDE);
        Self {
            side,
            data: vec![0u8; FAST_LEN + side * side].into_boxed_slice(),
            average: 0.0,
            variance_square: 0.0,
            filled: false,
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn fast(&self) -> &[u8] {
        &self.data[..FAST_LEN]
    }

    pub fn main(&self) -> &[u8] {
        &self.data[FAST_LEN..]
    }

    pub fn average(&self) -> f32 {
        self.average
    }

    pub fn variance_square(&self) -> f32 {
        self.variance_square
    }

    pub fn filled(&self) -> bool {
        self.filled
    }

    /// Take a `side×side` luma grid as `main`, derive `fast` and the summary
    /// statistics.
    pub fn fill(&mut self, main: &[u8], ignore_frame_width: usize) {
        assert_eq!(main.len(), self.side * self.side, "main grid size mismatch");
        self.data[FAST_LEN..].copy_from_slice(main);
        self.derive_fast(ignore_frame_width);
        let (average, variance_square) = grid_statistics(main);
        self.average = average;
        self.variance_square = variance_square;
        self.filled = true;
    }

    /// Rebuild a fingerprint read back from storage. Statistics missing from
    /// older records are recomputed.
    pub fn restore(
        side: usize,
        main: &[u8],
        ignore_frame_width: usize,
        statistics: Option<(f32, f32)>,
    ) -> Self {
        let mut fingerprint = PixelFingerprint::new(side);
        fingerprint.fill(main, ignore_frame_width);
        if let Some((average, variance_square)) = statistics {
            fingerprint.average = average;
            fingerprint.variance_square = variance_square;
        }
        fingerprint
    }

    /// Rotate 90° clockwise. Statistics are rotation invariant and kept.
    pub fn turn(&mut self) {
        let mut scratch = vec![0u8; self.data.len()].into_boxed_slice();
        turn_grid(&self.data[..FAST_LEN], &mut scratch[..FAST_LEN], FAST_SIDE);
        turn_grid(&self.data[FAST_LEN..], &mut scratch[FAST_LEN..], self.side);
        self.data = scratch;
    }

    /// Reflect horizontally.
    pub fn mirror(&mut self) {
        let mut scratch = vec![0u8; self.data.len()].into_boxed_slice();
        mirror_grid(&self.data[..FAST_LEN], &mut scratch[..FAST_LEN], FAST_SIDE);
        mirror_grid(&self.data[FAST_LEN..], &mut scratch[FAST_LEN..], self.side);
        self.data = scratch;
    }

    pub fn apply(&mut self, transform: Transform) {
        if transform.mirrored() {
            self.mirror();
        }
        for _ in 0..transform.turns() {
            self.turn();
        }
    }

    pub fn transformed(&self, transform: Transform) -> PixelFingerprint {
        let mut copy = self.clone();
        copy.apply(transform);
        copy
    }

    fn derive_fast(&mut self, ignore_frame_width: usize) {
        let side = self.side;
        let frame = ignore_frame_width.min((side - FAST_SIDE) / 2);
        let window = (side - 2 * frame) / FAST_SIDE;
        let n = (window * window) as u32;
        let (fast, main) = self.data.split_at_mut(FAST_LEN);

        for by in 0..FAST_SIDE {
            for bx in 0..FAST_SIDE {
                let mut sum = 0u32;
                let y0 = frame + by * window;
                let x0 = frame + bx * window;
                for y in y0..y0 + window {
                    let row = &main[y * side + x0..y * side + x0 + window];
                    sum += row.iter().map(|&v| v as u32).sum::<u32>();
                }
                fast[by * FAST_SIDE + bx] = ((sum + n / 2) / n) as u8;
            }
        }
    }
}

/// Mean and population variance of a grid.
pub fn grid_statistics(grid: &[u8]) -> (f32, f32) {
    if grid.is_empty() {
        return (0.0, 0.0);
    }
    let n = grid.len() as f64;
    let (sum, sum_sq) = grid.iter().fold((0u64, 0u64), |(s, sq), &v| {
        let v = v as u64;
        (s + v, sq + v * v)
    });
    let average = sum as f64 / n;
    let variance = (sum_sq as f64 / n - average * average).max(0.0);
    (average as f32, variance as f32)
}
