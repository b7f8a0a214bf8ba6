//! Alpha compositing of a probability mask onto the source pixels

use crate::{
    error::{Result, SnapEraseError},
    types::{probability_to_u8, Mask, SourceImage},
};
use image::{Rgba, RgbaImage};

/// Writes a mask into the alpha channel of the source image
pub struct Compositor;

impl Compositor {
    /// Produce an RGBA image whose colors are the source colors and whose alpha is
    /// `round(mask * 255)`
    ///
    /// Background pixels keep their color; only their alpha drops. Callers that
    /// flatten onto a background get the original color at partial alpha.
    ///
    /// # Errors
    /// - `InternalInvariantViolation` when mask and image dimensions differ
    pub fn composite(original: &SourceImage, mask: &Mask) -> Result<RgbaImage> {
        if original.dimensions() != mask.dimensions() {
            return Err(SnapEraseError::invariant(format!(
                "mask is {}x{}, image is {}x{}",
                mask.width(),
                mask.height(),
                original.width(),
                original.height()
            )));
        }

        let (width, height) = original.dimensions();
        let mut result = RgbaImage::new(width, height);

        for ((pixel, out), &probability) in original
            .pixels()
            .pixels()
            .zip(result.pixels_mut())
            .zip(mask.values())
        {
            let [r, g, b] = pixel.0;
            *out = Rgba([r, g, b, probability_to_u8(probability)]);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> SourceImage {
        SourceImage::new(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 13) as u8, (y * 29) as u8, ((x ^ y) * 5) as u8])
        }))
    }

    #[test]
    fn test_colors_are_preserved() {
        let source = gradient(17, 9);
        let values = (0..17 * 9).map(|i| (i % 4) as f32 / 3.0).collect();
        let mask = Mask::new(values, 17, 9).unwrap();

        let result = Compositor::composite(&source, &mask).unwrap();
        assert_eq!(result.dimensions(), source.dimensions());
        for (x, y, pixel) in result.enumerate_pixels() {
            let original = source.pixels().get_pixel(x, y);
            assert_eq!(&pixel.0[..3], &original.0[..]);
        }
    }

    #[test]
    fn test_alpha_rounds_mask() {
        let source = gradient(4, 1);
        let mask = Mask::new(vec![0.0, 0.5, 0.999, 1.0], 4, 1).unwrap();

        let result = Compositor::composite(&source, &mask).unwrap();
        let alphas: Vec<u8> = result.pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, vec![0, 128, 255, 255]);
    }

    #[test]
    fn test_transparent_pixels_keep_color() {
        let source = SourceImage::new(RgbImage::from_pixel(3, 3, Rgb([255, 0, 0])));
        let mask = Mask::new(vec![0.0; 9], 3, 3).unwrap();

        let result = Compositor::composite(&source, &mask).unwrap();
        assert!(result.pixels().all(|p| p.0 == [255, 0, 0, 0]));
    }

    #[test]
    fn test_dimension_mismatch() {
        let source = gradient(4, 4);
        let mask = Mask::new(vec![1.0; 12], 4, 3).unwrap();

        let err = Compositor::composite(&source, &mask).unwrap_err();
        assert!(err.is_internal());
    }
}
