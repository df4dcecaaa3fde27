//! Shared types for the visionode frame processing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blob::BlobLabelerKind;

/// Re-export `GrayImage` so downstream crates can take a copy of the
/// working buffer without depending on `image` directly.
pub use image::GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions pair.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Pixel count, or `None` if it does not fit in `usize`.
    #[must_use]
    pub const fn checked_pixel_count(self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format tag carried by a [`FrameDescriptor`].
///
/// Only [`Rgb565`](Self::Rgb565) is processed. The other tags exist so
/// that an acquisition layer can describe what it captured and have the
/// pipeline reject it cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 16 bits per pixel, `RRRRRGGG GGGBBBBB`, stored low byte first.
    Rgb565,
    /// 8 bits per pixel luminance.
    Grayscale,
    /// Compressed JPEG stream.
    Jpeg,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats, `None` for compressed ones.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Rgb565 => Some(2),
            Self::Grayscale => Some(1),
            Self::Jpeg => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb565 => f.write_str("RGB565"),
            Self::Grayscale => f.write_str("GRAYSCALE"),
            Self::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// A borrowed camera frame handed to [`Pipeline::process`](crate::Pipeline::process).
///
/// The pixel data belongs to the acquisition layer and only has to stay
/// valid for the duration of one `process` call. The pipeline never keeps
/// a reference to it.
#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor<'a> {
    /// Raw pixel bytes. `data.len()` is the frame's byte length.
    pub data: &'a [u8],
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Layout of `data`.
    pub format: PixelFormat,
}

impl<'a> FrameDescriptor<'a> {
    /// Describe an RGB565 frame.
    #[must_use]
    pub const fn rgb565(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgb565,
        }
    }

    /// Frame dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Configuration for the frame processing pipeline.
///
/// The pipeline copies the config in [`Pipeline::configure`](crate::Pipeline::configure),
/// so a config can never change in the middle of a `process` call.
///
/// ROI coordinates are in pixels of the resolution the ROI stage sees,
/// which is the native frame resolution because cropping runs before
/// downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Convert the RGB565 input to 8-bit luminance. Every later stage
    /// assumes single-byte input, so colour reduction runs regardless;
    /// the flag is kept for layout compatibility with stored configs.
    pub enable_grayscale: bool,

    /// Binarize the buffer against `threshold_val`.
    pub enable_threshold: bool,

    /// Pixels `>= threshold_val` become foreground (255).
    pub threshold_val: u8,

    /// Swap foreground and background after thresholding.
    pub invert: bool,

    /// Crop to the `roi_*` rectangle before downsampling.
    pub enable_roi: bool,

    /// ROI left edge.
    pub roi_x: u16,

    /// ROI top edge.
    pub roi_y: u16,

    /// ROI width.
    pub roi_w: u16,

    /// ROI height.
    pub roi_h: u16,

    /// Integer nearest-neighbor downsample factor. `1` disables the stage.
    pub downsample_factor: u16,

    /// Run connected-component analysis on the binarized buffer.
    pub enable_blob_detection: bool,

    /// Components smaller than this many pixels are discarded.
    pub min_blob_area: u32,

    /// Which labeling algorithm the blob stage uses.
    pub blob_labeler: BlobLabelerKind,
}

impl PipelineConfig {
    /// Default threshold level.
    pub const DEFAULT_THRESHOLD: u8 = 128;

    /// Default ROI width (QVGA).
    pub const DEFAULT_ROI_WIDTH: u16 = 320;

    /// Default ROI height (QVGA).
    pub const DEFAULT_ROI_HEIGHT: u16 = 240;

    /// Default downsample factor (disabled).
    pub const DEFAULT_DOWNSAMPLE_FACTOR: u16 = 1;

    /// Default minimum blob area in pixels.
    pub const DEFAULT_MIN_BLOB_AREA: u32 = 10;

    /// Check the config for values no stage can work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `downsample_factor`
    /// is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.downsample_factor == 0 {
            return Err(PipelineError::InvalidConfig(
                "downsample_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_grayscale: true,
            enable_threshold: false,
            threshold_val: Self::DEFAULT_THRESHOLD,
            invert: false,
            enable_roi: false,
            roi_x: 0,
            roi_y: 0,
            roi_w: Self::DEFAULT_ROI_WIDTH,
            roi_h: Self::DEFAULT_ROI_HEIGHT,
            downsample_factor: Self::DEFAULT_DOWNSAMPLE_FACTOR,
            enable_blob_detection: false,
            min_blob_area: Self::DEFAULT_MIN_BLOB_AREA,
            blob_labeler: BlobLabelerKind::default(),
        }
    }
}

/// A connected foreground region found by the blob stage.
///
/// All coordinates are in the working buffer's final coordinate system,
/// i.e. relative to the ROI origin and divided by the downsample factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// Bounding box left edge.
    pub x: u32,
    /// Bounding box top edge.
    pub y: u32,
    /// Bounding box width.
    pub width: u32,
    /// Bounding box height.
    pub height: u32,
    /// Centroid x (mean of member x coordinates, truncated).
    pub cx: u32,
    /// Centroid y (mean of member y coordinates, truncated).
    pub cy: u32,
    /// Number of member pixels.
    pub area: u32,
}

/// Errors that can occur while processing a frame.
///
/// None of these are fatal: the pipeline logs the error, leaves the
/// previous frame's output untouched and is ready for the next call.
///
/// Uses custom `Serialize`/`Deserialize` so the CLI can report failures
/// in its JSON output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The frame has no pixel data or a zero dimension.
    #[error("input frame is empty")]
    EmptyInput,

    /// The frame's pixel format is not RGB565.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(PixelFormat),

    /// The frame holds fewer bytes than its dimensions require.
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required by `width * height * 2`.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// The frame's byte size does not fit in the address space.
    #[error("frame dimensions {0} are too large")]
    FrameTooLarge(Dimensions),

    /// Neither memory tier could provide the working buffer.
    #[error("failed to allocate {bytes} byte working buffer")]
    AllocationFailure {
        /// Size of the failed request.
        bytes: usize,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    EmptyInput,
    UnsupportedFormat(PixelFormat),
    FrameTooShort { expected: usize, actual: usize },
    FrameTooLarge(Dimensions),
    AllocationFailure { bytes: usize },
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::UnsupportedFormat(format) => PipelineErrorProxy::UnsupportedFormat(*format),
            Self::FrameTooShort { expected, actual } => PipelineErrorProxy::FrameTooShort {
                expected: *expected,
                actual: *actual,
            },
            Self::FrameTooLarge(dims) => PipelineErrorProxy::FrameTooLarge(*dims),
            Self::AllocationFailure { bytes } => {
                PipelineErrorProxy::AllocationFailure { bytes: *bytes }
            }
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::UnsupportedFormat(format) => Self::UnsupportedFormat(format),
            PipelineErrorProxy::FrameTooShort { expected, actual } => {
                Self::FrameTooShort { expected, actual }
            }
            PipelineErrorProxy::FrameTooLarge(dims) => Self::FrameTooLarge(dims),
            PipelineErrorProxy::AllocationFailure { bytes } => Self::AllocationFailure { bytes },
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
