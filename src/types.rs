//! Core types flowing through the background removal pipeline

use crate::error::{Result, SnapEraseError};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, Luma, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Decoded 8-bit RGB photograph handed to the pipeline
///
/// The pipeline only ever borrows this; it is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pixels: RgbImage,
}

impl SourceImage {
    /// Wrap an already decoded RGB buffer
    #[must_use]
    pub fn new(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Convert any decoded image, dropping an alpha channel if present
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    /// Build from raw interleaved RGB bytes
    ///
    /// # Errors
    /// - Buffer length does not equal `width * height * 3`
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        let actual = data.len();
        RgbImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| {
                SnapEraseError::invalid_input(format!(
                    "RGB buffer of {actual} bytes does not match {width}x{height} (expected {expected})"
                ))
            })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// True when either side is zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Borrow the underlying pixel buffer
    #[must_use]
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

impl From<RgbImage> for SourceImage {
    fn from(pixels: RgbImage) -> Self {
        Self::new(pixels)
    }
}

impl From<&DynamicImage> for SourceImage {
    fn from(image: &DynamicImage) -> Self {
        Self::from_dynamic(image)
    }
}

/// Foreground probability surface at the original image resolution
///
/// Values are row-major and always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl Mask {
    /// Create a mask, clamping every value into `[0, 1]`
    ///
    /// # Errors
    /// - `data.len()` differs from `width * height`
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(SnapEraseError::invariant(format!(
                "mask has {} values, {width}x{height} requires {expected}",
                data.len()
            )));
        }

        let data = data.into_iter().map(clamp_probability).collect();
        Ok(Self {
            data,
            width,
            height,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major probability values
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Probability at `(x, y)`, `None` when out of bounds
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Render as an 8-bit grayscale image (debug output, `--save-mask`)
    #[must_use]
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([probability_to_u8(self.get(x, y).unwrap_or(0.0))])
        })
    }

    /// Foreground/background pixel counts with a 0.5 threshold
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&v| v > 0.5).count();
        let background_pixels = total_pixels - foreground_pixels;
        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }
}

/// Clamp a raw model confidence into a valid probability
///
/// NaN maps to 0 so that it can never become an alpha value.
#[must_use]
pub fn clamp_probability(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Scale a probability to an 8-bit channel value
#[must_use]
pub fn probability_to_u8(value: f32) -> u8 {
    (clamp_probability(value) * f32::from(u8::MAX)).round() as u8
}

/// Mask statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Detailed per-stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first run only)
    pub model_load_ms: u64,
    /// Resize, normalize and tensor conversion
    pub preprocessing_ms: u64,
    /// Backend inference call
    pub inference_ms: u64,
    /// Mask decoding and compositing
    pub postprocessing_ms: u64,
    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// One-line summary for logs and the CLI
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Preprocess: {}ms | Inference: {}ms | Postprocess: {}ms",
            self.total_ms, self.preprocessing_ms, self.inference_ms, self.postprocessing_ms
        )
    }
}

/// Metadata attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Name of the model configuration used
    pub model_name: String,
    /// Stage timings
    pub timings: ProcessingTimings,
    /// Wall clock time when the run finished
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(model_name: String, timings: ProcessingTimings) -> Self {
        Self {
            model_name,
            timings,
            processed_at: Utc::now(),
        }
    }
}

/// RGBA output of a pipeline run
///
/// Colors are those of the source image; the alpha channel carries the mask.
#[derive(Debug, Clone)]
pub struct ResultImage {
    image: RgbaImage,
    metadata: ProcessingMetadata,
}

impl ResultImage {
    #[must_use]
    pub fn new(image: RgbaImage, metadata: ProcessingMetadata) -> Self {
        Self { image, metadata }
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Take ownership of the pixel buffer
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    #[must_use]
    pub fn metadata(&self) -> &ProcessingMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode as PNG into memory
    ///
    /// # Errors
    /// - PNG encoder failure
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Save as PNG with alpha channel
    ///
    /// # Errors
    /// - File cannot be created
    /// - PNG encoder failure
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}
