//! Region-of-interest crop.
//!
//! Compacts the selected rectangle to the front of the working buffer,
//! row by row. Bytes past the new extent are left stale. After the crop
//! every coordinate reported downstream is relative to the ROI origin.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineConfig};

/// A rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Roi {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle stored in a pipeline config.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            u32::from(config.roi_x),
            u32::from(config.roi_y),
            u32::from(config.roi_w),
            u32::from(config.roi_h),
        )
    }

    /// Clamp the rectangle so it lies inside an image of size `dims`.
    ///
    /// The origin is pulled in to the last row/column, then the extent
    /// is cut to what remains. Returns `None` when the clamped width or
    /// height is zero.
    #[must_use]
    pub fn clamp(self, dims: Dimensions) -> Option<Self> {
        if dims.is_empty() {
            return None;
        }
        let x = self.x.min(dims.width - 1);
        let y = self.y.min(dims.height - 1);
        let width = self.width.min(dims.width - x);
        let height = self.height.min(dims.height - y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self::new(x, y, width, height))
    }
}

/// Crop `buffer` (holding an image of size `dims`) to `roi` in place.
///
/// Returns the new dimensions. A rectangle that clamps to nothing
/// leaves the buffer and dimensions unchanged.
pub fn crop_in_place(buffer: &mut [u8], dims: Dimensions, roi: Roi) -> Dimensions {
    let Some(roi) = roi.clamp(dims) else {
        tracing::debug!(?roi, %dims, "degenerate ROI, skipping crop");
        return dims;
    };

    let stride = dims.width as usize;
    let (rx, ry) = (roi.x as usize, roi.y as usize);
    let (rw, rh) = (roi.width as usize, roi.height as usize);

    // Destination row start never exceeds source row start, so moving
    // rows top to bottom never overwrites unread data.
    for row in 0..rh {
        let src = (ry + row) * stride + rx;
        buffer.copy_within(src..src + rw, row * rw);
    }

    Dimensions::new(roi.width, roi.height)
}
