//! RGB565 pixel packing.

use image::RgbImage;

/// Pure white.
pub const WHITE: u16 = 0xFFFF;

/// Pure black.
pub const BLACK: u16 = 0x0000;

/// Pack 8-bit components into RGB565 by dropping low bits.
#[must_use]
pub const fn encode(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Pack an RGB image into RGB565 bytes, low byte first, row-major.
#[must_use]
pub fn encode_image(image: &RgbImage) -> Vec<u8> {
    image
        .pixels()
        .flat_map(|p| encode(p.0[0], p.0[1], p.0[2]).to_le_bytes())
        .collect()
}
