//! Frame acquisition.
//!
//! A [`FrameSource`] hands out owned RGB565 frames; the pipeline only
//! ever sees the borrowed [`FrameDescriptor`] from
//! [`OwnedFrame::descriptor`], valid while the frame is held.

use std::path::Path;

use visionode_pipeline::{Dimensions, FrameDescriptor, PixelFormat};

use crate::rgb565;

/// Errors producing a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError {
    /// The source is configured with a zero width or height.
    #[error("frame source has empty dimensions {0}")]
    EmptyFrame(Dimensions),

    /// An image file could not be read or decoded.
    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),
}

/// A captured frame that owns its pixel bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    data: Vec<u8>,
    dims: Dimensions,
    format: PixelFormat,
}

impl OwnedFrame {
    /// Wrap RGB565 bytes (low byte first, row-major).
    #[must_use]
    pub const fn rgb565(data: Vec<u8>, dims: Dimensions) -> Self {
        Self {
            data,
            dims,
            format: PixelFormat::Rgb565,
        }
    }

    /// Borrow the frame for one pipeline call.
    #[must_use]
    pub fn descriptor(&self) -> FrameDescriptor<'_> {
        FrameDescriptor {
            data: &self.data,
            width: self.dims.width,
            height: self.dims.height,
            format: self.format,
        }
    }

    /// Frame size in pixels.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Raw pixel bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Anything that can produce frames one at a time.
pub trait FrameSource {
    /// Capture the next frame.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameSourceError`] if no frame can be produced.
    fn capture(&mut self) -> Result<OwnedFrame, FrameSourceError>;
}

/// Synthetic camera: a black frame with a white square that moves right
/// by a fixed step on every capture.
///
/// Parts of the square past the frame edge are clipped.
#[derive(Debug, Clone)]
pub struct TestPattern {
    dims: Dimensions,
    square: u32,
    start_x: u32,
    y: u32,
    step: u32,
    captured: u32,
}

impl TestPattern {
    /// QVGA frame size.
    pub const QVGA: Dimensions = Dimensions::new(320, 240);
    /// Default square edge length.
    pub const DEFAULT_SQUARE: u32 = 40;
    /// Default x of the square in the first frame.
    pub const DEFAULT_START_X: u32 = 40;
    /// Default y of the square.
    pub const DEFAULT_Y: u32 = 100;
    /// Default horizontal movement per frame.
    pub const DEFAULT_STEP: u32 = 20;

    /// A QVGA pattern with the default square and motion.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dims: Self::QVGA,
            square: Self::DEFAULT_SQUARE,
            start_x: Self::DEFAULT_START_X,
            y: Self::DEFAULT_Y,
            step: Self::DEFAULT_STEP,
            captured: 0,
        }
    }

    /// Set the frame size.
    #[must_use]
    pub const fn with_dimensions(mut self, dims: Dimensions) -> Self {
        self.dims = dims;
        self
    }

    /// Set the square's edge length.
    #[must_use]
    pub const fn with_square(mut self, size: u32) -> Self {
        self.square = size;
        self
    }

    /// Set the square's position in the first frame.
    #[must_use]
    pub const fn with_origin(mut self, x: u32, y: u32) -> Self {
        self.start_x = x;
        self.y = y;
        self
    }

    /// Set the horizontal movement per frame.
    #[must_use]
    pub const fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    /// X position of the square in the next captured frame.
    #[must_use]
    pub const fn next_x(&self) -> u32 {
        self.start_x
            .saturating_add(self.captured.saturating_mul(self.step))
    }
}

impl Default for TestPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for TestPattern {
    fn capture(&mut self) -> Result<OwnedFrame, FrameSourceError> {
        if self.dims.is_empty() {
            return Err(FrameSourceError::EmptyFrame(self.dims));
        }
        let x0 = self.next_x();
        let width = self.dims.width;
        let mut data = vec![0u8; self.dims.pixel_count() * 2];
        let white = rgb565::WHITE.to_le_bytes();

        let x_end = x0.saturating_add(self.square).min(width);
        let y_end = self.y.saturating_add(self.square).min(self.dims.height);
        for y in self.y..y_end {
            for x in x0..x_end {
                let i = (y as usize * width as usize + x as usize) * 2;
                data[i..i + 2].copy_from_slice(&white);
            }
        }

        tracing::trace!(x = x0, y = self.y, frame = self.captured, "test pattern captured");
        self.captured += 1;
        Ok(OwnedFrame::rgb565(data, self.dims))
    }
}

/// Replays one still image, converted to RGB565, on every capture.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    frame: OwnedFrame,
}

impl ImageFileSource {
    /// Decode the image at `path` (PNG, JPEG, BMP or WebP).
    ///
    /// # Errors
    ///
    /// Returns [`FrameSourceError::Image`] if the file cannot be read
    /// or decoded, and [`FrameSourceError::EmptyFrame`] if it has no
    /// pixels.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FrameSourceError> {
        let path = path.as_ref();
        let rgb = image::open(path)?.to_rgb8();
        let dims = Dimensions::new(rgb.width(), rgb.height());
        if dims.is_empty() {
            return Err(FrameSourceError::EmptyFrame(dims));
        }
        tracing::debug!(path = %path.display(), %dims, "image frame source opened");
        Ok(Self::from_rgb(&rgb))
    }

    /// Use an in-memory RGB image.
    #[must_use]
    pub fn from_rgb(image: &image::RgbImage) -> Self {
        let dims = Dimensions::new(image.width(), image.height());
        Self {
            frame: OwnedFrame::rgb565(rgb565::encode_image(image), dims),
        }
    }
}

impl FrameSource for ImageFileSource {
    fn capture(&mut self) -> Result<OwnedFrame, FrameSourceError> {
        Ok(self.frame.clone())
    }
}
