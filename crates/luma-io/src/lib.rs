//! Image load/save for the luma pipeline.
//!
//! Every image is decoded to tightly packed RGBA8 regardless of the source
//! channel layout, and encoded from RGBA8 on save.
//!
//! # Supported Formats
//!
//! | Format | Read | Write | Notes |
//! |--------|------|-------|-------|
//! | PNG    | ✓    | ✓     | 8/16-bit, palette, gray; written lossless RGBA8 |
//! | JPEG   | ✓    | ✓     | Gray, RGB, CMYK; alpha dropped on write |
//!
//! # Example
//!
//! ```rust,ignore
//! use luma_io::{load, save};
//!
//! let image = load("input.jpg")?;
//! save("output.png", &image, 100)?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub mod detect;
pub mod jpeg;
pub mod png;

pub use detect::Format;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 100;

/// Image I/O error.
#[derive(Debug, Error)]
pub enum IoError {
    /// The output extension names no writable format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Pixel buffer does not match the dimensions.
    #[error("invalid image: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidImage {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Loading `path` failed.
    #[error("failed to load {}: {reason}", path.display())]
    ImageLoadFailed { path: PathBuf, reason: String },

    /// Saving `path` failed.
    #[error("failed to save {}: {reason}", path.display())]
    ImageSaveFailed { path: PathBuf, reason: String },
}

/// Result type for image I/O.
pub type IoResult<T> = Result<T, IoError>;

/// Host image: row-major RGBA8, no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl RgbaImage {
    /// Wrap a pixel buffer, checking its length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> IoResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(IoError::InvalidImage {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Image filled with one RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((width as usize) * (height as usize) * 4)
            .collect();
        Self { width, height, data }
    }

    /// Drop alpha: packed RGB8.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }
}

/// Load an image as RGBA8.
///
/// The format is taken from the file header, falling back to the extension.
/// Every failure, including an unrecognized format, is `ImageLoadFailed`.
pub fn load<P: AsRef<Path>>(path: P) -> IoResult<RgbaImage> {
    let path = path.as_ref();
    let failed = |reason: String| IoError::ImageLoadFailed {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| failed(e.to_string()))?;
    let image = match Format::from_bytes(&bytes).or(Format::from_extension(path)) {
        Format::Png => png::decode(&bytes),
        Format::Jpeg => jpeg::decode(&bytes),
        Format::Unknown => return Err(failed("unsupported format".to_string())),
    }
    .map_err(|e| failed(e.to_string()))?;

    debug!(path = %path.display(), width = image.width, height = image.height, "image loaded");
    Ok(image)
}

/// Save an RGBA8 image; the format is taken from the extension.
///
/// `quality` (1-100) applies to JPEG only. JPEG output drops alpha.
pub fn save<P: AsRef<Path>>(path: P, image: &RgbaImage, quality: u8) -> IoResult<()> {
    let path = path.as_ref();
    let failed = |reason: String| IoError::ImageSaveFailed {
        path: path.to_path_buf(),
        reason,
    };

    let encoded = match Format::from_extension(path) {
        Format::Png => png::encode(image),
        Format::Jpeg => jpeg::encode(image, quality),
        Format::Unknown => return Err(IoError::UnsupportedFormat(path.display().to_string())),
    }
    .map_err(|e| failed(e.to_string()))?;

    fs::write(path, &encoded).map_err(|e| failed(e.to_string()))?;
    debug!(path = %path.display(), bytes = encoded.len(), "image saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(RgbaImage::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            RgbaImage::new(2, 2, vec![0; 12]),
            Err(IoError::InvalidImage { expected: 16, actual: 12, .. })
        ));
    }

    #[test]
    fn test_filled_and_rgb() {
        let img = RgbaImage::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(img.data.len(), 24);
        assert_eq!(&img.data[20..], &[1, 2, 3, 4]);
        assert_eq!(img.to_rgb(), [1u8, 2, 3].repeat(6));
    }
}
