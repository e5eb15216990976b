/// Pixel layout handed over by a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    /// 4 bytes per pixel: blue, green, red, alpha.
    Bgra(Vec<u8>),
    /// 1 byte per pixel.
    Luma(Vec<u8>),
}

/// Rectangular decoded image, the only thing the core needs from a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelData,
}

impl CanonicalPixelBuffer {
    pub fn luma(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            pixels: PixelData::Luma(pixels),
        }
    }

    pub fn bgra(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels: PixelData::Bgra(pixels),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Luma plane, row-major. Alpha is ignored.
    pub fn to_luma(&self) -> Vec<u8> {
        match &self.pixels {
            PixelData::Luma(data) => data.clone(),
            PixelData::Bgra(data) => data
                .chunks_exact(4)
                .map(|px| {
                    let (b, g, r) = (px[0] as u32, px[1] as u32, px[2] as u32);
                    ((r * 77 + g * 150 + b * 29 + 128) >> 8) as u8
                })
                .collect(),
        }
    }
}

/// Area-average a `width×height` luma plane down (or nearest-sample up) to
/// a `side×side` grid.
pub fn resample_luma(luma: &[u8], width: usize, height: usize, side: usize) -> Vec<u8> {
    debug_assert_eq!(luma.len(), width * height);
    let mut out = vec![0u8; side * side];
    if width == 0 || height == 0 {
        return out;
    }
    for dy in 0..side {
        let y0 = dy * height / side;
        let y1 = ((dy + 1) * height / side).max(y0 + 1);
        for dx in 0..side {
            let x0 = dx * width / side;
            let x1 = ((dx + 1) * width / side).max(x0 + 1);
            let mut sum = 0u64;
            for y in y0..y1 {
                let row = &luma[y * width..(y + 1) * width];
                sum += row[x0..x1].iter().map(|&v| v as u64).sum::<u64>();
            }
            let n = ((y1 - y0) * (x1 - x0)) as u64;
            out[dy * side + dx] = ((sum + n / 2) / n) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_luma() {
        let buffer = CanonicalPixelBuffer::bgra(
            3,
            1,
            vec![0, 0, 0, 255, 255, 255, 255, 255, 0, 0, 255, 255],
        );
        let luma = buffer.to_luma();
        assert_eq!(luma[0], 0);
        assert_eq!(luma[1], 255);
        // pure red
        assert_eq!(luma[2], 77);
    }

    #[test]
    fn test_resample_halves_by_block_average() {
        let mut luma = vec![100u8; 4 * 4];
        luma[0] = 200;
        let out = resample_luma(&luma, 4, 4, 2);
        assert_eq!(out, vec![125, 100, 100, 100]);
    }

    #[test]
    fn test_resample_upscales_by_nearest() {
        let out = resample_luma(&[10, 20, 30, 40], 2, 2, 4);
        assert_eq!(&out[0..4], &[10, 10, 20, 20]);
        assert_eq!(&out[12..16], &[30, 30, 40, 40]);
    }

    #[test]
    fn test_resample_non_square() {
        let luma: Vec<u8> = (0..8).map(|i| if i < 4 { 0 } else { 200 }).collect();
        // 4 wide, 2 high: top row black, bottom row bright
        let out = resample_luma(&luma, 4, 2, 2);
        assert_eq!(out, vec![0, 0, 200, 200]);
    }
}
