//! Raster image encoding for dumping the working buffer.

use std::path::Path;

use image::ImageEncoder;
use visionode_pipeline::GrayImage;

/// Errors that can occur while writing a raster dump.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(String),

    /// Writing the file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination that could not be written.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl From<image::ImageError> for RasterError {
    fn from(err: image::ImageError) -> Self {
        Self::PngEncode(err.to_string())
    }
}

/// Encode a `GrayImage` as 8-bit grayscale PNG bytes.
///
/// # Errors
///
/// Returns [`RasterError::PngEncode`] if PNG encoding fails.
pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, RasterError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(png_bytes)
}

/// Encode a `GrayImage` as PNG and write it to `path`.
///
/// # Errors
///
/// Returns [`RasterError::PngEncode`] if PNG encoding fails.
/// Returns [`RasterError::Write`] if the file cannot be written.
pub fn save_gray_png(path: impl AsRef<Path>, image: &GrayImage) -> Result<(), RasterError> {
    let path = path.as_ref();
    let png = encode_gray_png(image)?;
    std::fs::write(path, &png).map_err(|source| RasterError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = png.len(), "raster dump written");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn png_has_signature_and_decodes_back() {
        let mut image = GrayImage::new(4, 3);
        image.put_pixel(1, 2, image::Luma([200]));
        let png = encode_gray_png(&image).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn save_to_missing_directory_reports_path() {
        let path = std::env::temp_dir()
            .join("visionode-missing-dir-for-raster-test")
            .join("out.png");
        let err = save_gray_png(&path, &GrayImage::new(1, 1)).unwrap_err();
        assert!(matches!(err, RasterError::Write { .. }));
        assert!(err.to_string().contains("out.png"));
    }
}
