//! visionode-pipeline: on-device camera frame pipeline (sans-IO).
//!
//! Turns an RGB565 camera frame into a list of blobs through:
//! grayscale -> ROI crop -> downsample -> threshold -> blob detection.
//!
//! Every stage works in place on one reusable byte buffer owned by
//! [`Pipeline`], so a steady stream of same-sized frames allocates
//! once. The stages are also exposed as free functions over
//! `(&mut [u8], Dimensions)` so they can be driven and tested alone.
//!
//! This crate has **no I/O dependencies**. Frame capture, config
//! persistence and image dumps live in `visionode-io`.
//!
//! ```
//! use visionode_pipeline::{FrameDescriptor, Pipeline, PipelineConfig};
//!
//! let mut pipeline = Pipeline::with_config(PipelineConfig {
//!     enable_threshold: true,
//!     enable_blob_detection: true,
//!     min_blob_area: 1,
//!     ..PipelineConfig::default()
//! })?;
//!
//! // 4x4 black frame with one white pixel at (1, 2).
//! let mut data = vec![0u8; 4 * 4 * 2];
//! data[(2 * 4 + 1) * 2..][..2].copy_from_slice(&0xFFFF_u16.to_le_bytes());
//!
//! pipeline.process(&FrameDescriptor::rgb565(&data, 4, 4))?;
//! assert_eq!(pipeline.blobs().len(), 1);
//! assert_eq!((pipeline.blobs()[0].x, pipeline.blobs()[0].y), (1, 2));
//! # Ok::<(), visionode_pipeline::PipelineError>(())
//! ```

pub mod blob;
pub mod buffer;
pub mod diagnostics;
pub mod downsample;
pub mod grayscale;
pub mod pipeline;
pub mod roi;
pub mod threshold;
pub mod types;

pub use blob::{BlobDetector, BlobLabeler, BlobLabelerKind, LabelStats};
pub use buffer::{CappedHeap, MemoryTier, SystemHeap, WorkingBuffer};
pub use diagnostics::{Clock, FrameTimer, NullClock, PipelineDiagnostics};
pub use pipeline::Pipeline;
pub use roi::Roi;
pub use types::{
    Blob, Dimensions, FrameDescriptor, GrayImage, PipelineConfig, PipelineError, PixelFormat,
};
