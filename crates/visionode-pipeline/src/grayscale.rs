//! Colour reduction: RGB565 to 8-bit luminance.
//!
//! This is the first stage and always runs. Every later stage works on
//! one byte per pixel.
//!
//! The conversion is pure integer arithmetic so it is fast on cores
//! without an FPU and bit-for-bit reproducible:
//!
//! 1. Expand each component to 8 bits with a multiply-and-shift:
//!    `r8 = (r5 * 527 + 23) >> 6`, `g8 = (g6 * 259 + 33) >> 6`,
//!    `b8 = (b5 * 527 + 23) >> 6`.
//! 2. Weight with perceptual luma coefficients:
//!    `(r8 * 77 + g8 * 150 + b8 * 29) >> 8`.
//!
//! The expansion constants are tied to the 5/6/5 bit widths.

/// Expansion multiplier for 5-bit components.
const SCALE_5: u32 = 527;
/// Rounding term for 5-bit components.
const ROUND_5: u32 = 23;
/// Expansion multiplier for the 6-bit green component.
const SCALE_6: u32 = 259;
/// Rounding term for the 6-bit green component.
const ROUND_6: u32 = 33;

/// Luma weights: `Y = (77*R + 150*G + 29*B) >> 8`.
const COEF_R: u32 = 77;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Luminance of a single RGB565 pixel.
#[must_use]
pub const fn luma_from_rgb565(pixel: u16) -> u8 {
    let pixel = pixel as u32;
    let r = (pixel >> 11) & 0x1F;
    let g = (pixel >> 5) & 0x3F;
    let b = pixel & 0x1F;

    let r8 = (r * SCALE_5 + ROUND_5) >> 6;
    let g8 = (g * SCALE_6 + ROUND_6) >> 6;
    let b8 = (b * SCALE_5 + ROUND_5) >> 6;

    // Max is (255 * 256) >> 8 = 255, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation)]
    let luma = ((r8 * COEF_R + g8 * COEF_G + b8 * COEF_B) >> 8) as u8;
    luma
}

/// Convert packed RGB565 bytes (low byte first) to luminance.
///
/// Writes one byte per pixel into `dst`, in the same row-major order.
/// Converts `min(src.len() / 2, dst.len())` pixels and returns that count.
pub fn rgb565_to_luma(src: &[u8], dst: &mut [u8]) -> usize {
    let mut written = 0;
    for (pair, out) in src.chunks_exact(2).zip(dst.iter_mut()) {
        let pixel = u16::from_le_bytes([pair[0], pair[1]]);
        *out = luma_from_rgb565(pixel);
        written += 1;
    }
    written
}
