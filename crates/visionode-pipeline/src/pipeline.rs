//! The frame pipeline driver.
//!
//! [`Pipeline`] owns the working buffer, the current image dimensions
//! and the blob list. Each [`process`](Pipeline::process) call validates
//! the incoming frame, grows the buffer if needed, then runs the enabled
//! stages in fixed order:
//!
//! 1. grayscale (always)
//! 2. ROI crop
//! 3. downsample
//! 4. threshold
//! 5. blob detection
//!
//! Every check that can fail runs before any state is touched, so a
//! rejected frame leaves the previous frame's output readable.

use crate::blob::BlobDetector;
use crate::buffer::WorkingBuffer;
use crate::diagnostics::{
    Clock, NullClock, PipelineDiagnostics, PipelineSummary, StageDiagnostics, StageMetrics,
};
use crate::downsample::downsample_in_place;
use crate::grayscale::rgb565_to_luma;
use crate::roi::{Roi, crop_in_place};
use crate::threshold::{count_foreground, threshold_in_place};
use crate::types::{
    Blob, Dimensions, FrameDescriptor, GrayImage, PipelineConfig, PipelineError, PixelFormat,
};

/// Frame processing pipeline.
///
/// Outputs ([`buffer`](Self::buffer), [`dimensions`](Self::dimensions),
/// [`blobs`](Self::blobs)) describe the last successfully processed frame
/// and stay valid until the next successful `process` call.
///
/// With blob detection enabled the final buffer is all background: the
/// labeler clears each pixel as it visits it.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    buffer: WorkingBuffer,
    dims: Dimensions,
    blobs: Vec<Blob>,
    detector: BlobDetector,
}

impl Pipeline {
    /// Create a pipeline with the default config and memory tiers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(WorkingBuffer::new())
    }

    /// Create a pipeline around a caller-built working buffer, e.g. one
    /// with custom memory tiers.
    #[must_use]
    pub fn with_buffer(buffer: WorkingBuffer) -> Self {
        Self {
            config: PipelineConfig::default(),
            buffer,
            dims: Dimensions::default(),
            blobs: Vec::new(),
            detector: BlobDetector::new(),
        }
    }

    /// Replace the blob detector, e.g. with one whose flood fill queue
    /// is bounded.
    #[must_use]
    pub fn with_detector(mut self, detector: BlobDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Create a pipeline with the default memory tiers and `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// [`PipelineConfig::validate`].
    pub fn with_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let mut pipeline = Self::new();
        pipeline.configure(config)?;
        Ok(pipeline)
    }

    /// Replace the active config. Takes effect on the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// [`PipelineConfig::validate`]; the previous config stays active.
    pub fn configure(&mut self, config: PipelineConfig) -> Result<(), PipelineError> {
        if let Err(err) = config.validate() {
            tracing::warn!(error = %err, "rejected pipeline config");
            return Err(err);
        }
        if !config.enable_grayscale {
            tracing::warn!(
                "enable_grayscale is off, but later stages need luminance input; converting anyway"
            );
        }
        tracing::debug!(?config, "pipeline configured");
        self.config = config;
        Ok(())
    }

    /// The active config.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`], [`PipelineError::UnsupportedFormat`],
    /// [`PipelineError::FrameTooLarge`] or [`PipelineError::FrameTooShort`]
    /// if the frame cannot be read, and [`PipelineError::AllocationFailure`]
    /// if the working buffer or the blob scratch cannot grow to fit it.
    /// In every case no stage has run and the previous output is
    /// unchanged.
    pub fn process(&mut self, frame: &FrameDescriptor<'_>) -> Result<(), PipelineError> {
        self.run(frame, &NullClock, false).map(drop)
    }

    /// Process one frame and report per-stage timing and metrics.
    ///
    /// # Errors
    ///
    /// Same as [`process`](Self::process).
    pub fn process_with_diagnostics<C: Clock>(
        &mut self,
        frame: &FrameDescriptor<'_>,
        clock: &C,
    ) -> Result<PipelineDiagnostics, PipelineError> {
        self.run(frame, clock, true)
    }

    /// The processed image: `width * height` bytes, row-major.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.dims.pixel_count()]
    }

    /// Dimensions of [`buffer`](Self::buffer).
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Output width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dims.width
    }

    /// Output height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dims.height
    }

    /// Blobs found in the last frame.
    #[must_use]
    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    /// The working buffer, for inspecting its capacity and tier.
    #[must_use]
    pub const fn working_buffer(&self) -> &WorkingBuffer {
        &self.buffer
    }

    /// Copy the processed image out as a [`GrayImage`].
    #[must_use]
    pub fn output_image(&self) -> GrayImage {
        let width = self.dims.width as usize;
        let pixels = self.buffer();
        GrayImage::from_fn(self.dims.width, self.dims.height, |x, y| {
            image::Luma([pixels[y as usize * width + x as usize]])
        })
    }

    /// Check a frame and return its pixel and byte counts.
    fn check_frame(frame: &FrameDescriptor<'_>) -> Result<(usize, usize), PipelineError> {
        let dims = frame.dimensions();
        if frame.data.is_empty() || dims.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let bytes_per_pixel = match frame.format.bytes_per_pixel() {
            Some(bpp) if frame.format == PixelFormat::Rgb565 => bpp,
            _ => return Err(PipelineError::UnsupportedFormat(frame.format)),
        };
        let pixels = dims.checked_pixel_count();
        let expected = pixels.and_then(|p| p.checked_mul(bytes_per_pixel));
        let (Some(pixels), Some(expected)) = (pixels, expected) else {
            return Err(PipelineError::FrameTooLarge(dims));
        };
        if frame.data.len() < expected {
            return Err(PipelineError::FrameTooShort {
                expected,
                actual: frame.data.len(),
            });
        }
        Ok((pixels, expected))
    }

    /// Dimensions the blob stage will see for an `input`-sized frame.
    fn planned_dimensions(config: &PipelineConfig, input: Dimensions) -> Dimensions {
        let mut dims = input;
        if config.enable_roi
            && let Some(roi) = Roi::from_config(config).clamp(dims)
        {
            dims = Dimensions::new(roi.width, roi.height);
        }
        let factor = u32::from(config.downsample_factor);
        if factor > 1 {
            dims = Dimensions::new(dims.width / factor, dims.height / factor);
        }
        dims
    }

    /// Reserve everything the frame needs. The blob scratch goes first:
    /// growing the working buffer discards the previous output.
    fn reserve(&mut self, input: Dimensions, pixels: usize) -> Result<(), PipelineError> {
        if self.config.enable_blob_detection {
            let planned = Self::planned_dimensions(&self.config, input);
            self.detector
                .prepare(self.config.blob_labeler, planned.pixel_count())?;
        }
        self.buffer.ensure_capacity(pixels)?;
        Ok(())
    }

    fn run<C: Clock>(
        &mut self,
        frame: &FrameDescriptor<'_>,
        clock: &C,
        detailed: bool,
    ) -> Result<PipelineDiagnostics, PipelineError> {
        let started = clock.now();

        let (pixels, expected) = Self::check_frame(frame)
            .and_then(|(pixels, bytes)| {
                self.reserve(frame.dimensions(), pixels)
                    .map(|()| (pixels, bytes))
            })
            .inspect_err(|err| {
                tracing::error!(
                    error = %err,
                    width = frame.width,
                    height = frame.height,
                    format = %frame.format,
                    "frame skipped, keeping previous output"
                );
            })?;

        let config = self.config;
        let input = frame.dimensions();
        let buf = self.buffer.as_mut_slice();
        self.blobs.clear();
        let mut dims = input;

        // 1. Grayscale.
        let t = clock.now();
        rgb565_to_luma(&frame.data[..expected], &mut buf[..pixels]);
        let grayscale = StageDiagnostics {
            duration: clock.elapsed(&t),
            metrics: StageMetrics::Grayscale {
                width: dims.width,
                height: dims.height,
            },
        };

        // 2. ROI.
        let roi = if config.enable_roi {
            let t = clock.now();
            let rect = Roi::from_config(&config);
            let clamped = rect.clamp(dims);
            dims = crop_in_place(buf, dims, rect);
            Some(StageDiagnostics {
                duration: clock.elapsed(&t),
                metrics: StageMetrics::Roi {
                    x: clamped.map_or(0, |r| r.x),
                    y: clamped.map_or(0, |r| r.y),
                    width: dims.width,
                    height: dims.height,
                    applied: clamped.is_some(),
                },
            })
        } else {
            None
        };

        // 3. Downsample.
        let factor = u32::from(config.downsample_factor);
        let downsample = if factor > 1 {
            let t = clock.now();
            dims = downsample_in_place(buf, dims, factor);
            Some(StageDiagnostics {
                duration: clock.elapsed(&t),
                metrics: StageMetrics::Downsample {
                    factor,
                    width: dims.width,
                    height: dims.height,
                },
            })
        } else {
            None
        };

        let out = &mut buf[..dims.pixel_count()];

        // 4. Threshold.
        let threshold = if config.enable_threshold {
            let t = clock.now();
            threshold_in_place(out, config.threshold_val, config.invert);
            let duration = clock.elapsed(&t);
            Some(StageDiagnostics {
                duration,
                metrics: StageMetrics::Threshold {
                    threshold: config.threshold_val,
                    invert: config.invert,
                    foreground_pixels: if detailed { count_foreground(out) } else { 0 },
                },
            })
        } else {
            None
        };

        // 5. Blob detection.
        let blob_detection = if config.enable_blob_detection {
            let t = clock.now();
            let stats = self.detector.detect(
                config.blob_labeler,
                out,
                dims,
                config.min_blob_area,
                &mut self.blobs,
            );
            Some(StageDiagnostics {
                duration: clock.elapsed(&t),
                metrics: StageMetrics::BlobDetection {
                    labeler: config.blob_labeler,
                    components: stats.components,
                    blobs: self.blobs.len(),
                    discarded: stats.discarded,
                    largest_area: stats.largest_area,
                },
            })
        } else {
            None
        };

        debug_assert_eq!(dims, Self::planned_dimensions(&config, input));
        self.dims = dims;
        tracing::trace!(
            input = %input,
            output = %dims,
            blobs = self.blobs.len(),
            "frame processed"
        );

        Ok(PipelineDiagnostics {
            grayscale,
            roi,
            downsample,
            threshold,
            blob_detection,
            total_duration: clock.elapsed(&started),
            summary: PipelineSummary {
                input_width: input.width,
                input_height: input.height,
                output_width: dims.width,
                output_height: dims.height,
                blob_count: self.blobs.len(),
            },
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
