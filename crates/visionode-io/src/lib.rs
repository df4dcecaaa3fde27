//! visionode-io: the pipeline's external collaborators.
//!
//! Config persistence (a fixed-layout blob with file and in-memory
//! stores), frame sources that produce RGB565 frames, and PNG dumps of
//! the working buffer. Everything that touches a filesystem or decodes
//! files lives here so `visionode-pipeline` stays sans-IO.

pub mod frame_source;
pub mod raster;
pub mod rgb565;
pub mod settings;

pub use frame_source::{FrameSource, FrameSourceError, ImageFileSource, OwnedFrame, TestPattern};
pub use raster::{RasterError, save_gray_png};
pub use settings::{ConfigStore, FileStore, MemoryStore, SettingsError, load_or_init};
