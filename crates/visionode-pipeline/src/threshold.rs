//! Global threshold binarization.
//!
//! Every pixel becomes `255` (foreground) or `0` (background). With
//! `invert` set the test is flipped, which turns dark objects on a light
//! background into foreground.

/// Foreground value in a binary mask.
pub const FOREGROUND: u8 = 255;

/// Background value in a binary mask.
pub const BACKGROUND: u8 = 0;

/// Binarize `pixels` in place: `value >= threshold` is foreground,
/// unless `invert` is set.
pub fn threshold_in_place(pixels: &mut [u8], threshold: u8, invert: bool) {
    for px in pixels {
        let pass = (*px >= threshold) != invert;
        *px = if pass { FOREGROUND } else { BACKGROUND };
    }
}

/// Count foreground pixels in a binary mask.
#[must_use]
pub fn count_foreground(mask: &[u8]) -> u64 {
    mask.iter().map(|&p| u64::from(p == FOREGROUND)).sum()
}
