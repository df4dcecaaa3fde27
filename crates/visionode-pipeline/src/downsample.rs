//! Integer-factor nearest-neighbor downsampling.
//!
//! Shrinks the working image by `factor` on both axes, keeping the pixel
//! at `(x * factor, y * factor)` for every output pixel `(x, y)`. Output
//! dimensions use integer division, so trailing rows and columns that
//! do not fill a whole cell are dropped.
//!
//! Runs in place: the output index `y * new_w + x` is never greater than
//! the source index `y * factor * width + x * factor`, and output pixels
//! are written in increasing order, so no unread source pixel is ever
//! overwritten.

use crate::types::Dimensions;

/// Downsample `buffer` (holding an image of size `dims`) by `factor`.
///
/// Returns the new dimensions. A factor of 0 or 1 leaves the buffer and
/// dimensions unchanged.
pub fn downsample_in_place(buffer: &mut [u8], dims: Dimensions, factor: u32) -> Dimensions {
    if factor <= 1 {
        return dims;
    }

    let new_dims = Dimensions::new(dims.width / factor, dims.height / factor);
    let stride = dims.width as usize;
    let factor = factor as usize;
    let (new_w, new_h) = (new_dims.width as usize, new_dims.height as usize);

    let mut dst = 0;
    for y in 0..new_h {
        let row = y * factor * stride;
        for x in 0..new_w {
            buffer[dst] = buffer[row + x * factor];
            dst += 1;
        }
    }

    new_dims
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Image where each pixel holds its own index (mod 256).
    fn indexed(dims: Dimensions) -> Vec<u8> {
        #[allow(clippy::cast_possible_truncation)]
        (0..dims.pixel_count()).map(|i| i as u8).collect()
    }

    #[test]
    fn factor_one_is_noop() {
        let dims = Dimensions::new(6, 4);
        let mut buf = indexed(dims);
        let original = buf.clone();
        assert_eq!(downsample_in_place(&mut buf, dims, 1), dims);
        assert_eq!(buf, original);
    }

    #[test]
    fn factor_zero_is_noop() {
        let dims = Dimensions::new(6, 4);
        let mut buf = indexed(dims);
        let original = buf.clone();
        assert_eq!(downsample_in_place(&mut buf, dims, 0), dims);
        assert_eq!(buf, original);
    }

    #[test]
    fn factor_two_samples_top_left_of_each_cell() {
        let dims = Dimensions::new(4, 4);
        let mut buf = indexed(dims);
        let out = downsample_in_place(&mut buf, dims, 2);
        assert_eq!(out, Dimensions::new(2, 2));
        // Sources: (0,0)=0, (2,0)=2, (0,2)=8, (2,2)=10
        assert_eq!(&buf[..4], &[0, 2, 8, 10]);
    }

    #[test]
    fn uses_original_stride() {
        // Width 6, factor 3: row 1 of output must read row 3 of the source.
        let dims = Dimensions::new(6, 6);
        let mut buf = indexed(dims);
        let out = downsample_in_place(&mut buf, dims, 3);
        assert_eq!(out, Dimensions::new(2, 2));
        assert_eq!(&buf[..4], &[0, 3, 18, 21]);
    }

    #[test]
    fn truncates_partial_cells() {
        let dims = Dimensions::new(5, 3);
        let mut buf = indexed(dims);
        let out = downsample_in_place(&mut buf, dims, 2);
        assert_eq!(out, Dimensions::new(2, 1));
        assert_eq!(&buf[..2], &[0, 2]);
    }

    #[test]
    fn factor_larger_than_image_yields_empty() {
        let dims = Dimensions::new(3, 3);
        let mut buf = indexed(dims);
        let out = downsample_in_place(&mut buf, dims, 4);
        assert!(out.is_empty());
    }
}
