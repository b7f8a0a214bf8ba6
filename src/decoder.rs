//! Mask decoding: raw model confidence to a full-resolution probability mask

use crate::{
    config::Interpolation,
    error::{Result, SnapEraseError},
    types::{clamp_probability, Mask},
};
use image::{ImageBuffer, Luma};
use ndarray::{s, Array4};

/// Single-channel `f32` plane used for resampling
type ProbabilityPlane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Converts `[1, 1, S, S]` model output into a [`Mask`] at image resolution
pub struct MaskDecoder;

impl MaskDecoder {
    /// Clamp the raw surface into `[0, 1]` and resample it to `target_width` x `target_height`
    ///
    /// The resample uses the same kernel as the encoder's resize. Higher-order
    /// kernels can ring past the clamped range, so values are clamped again on the
    /// way into the [`Mask`].
    ///
    /// # Errors
    /// - `InternalInvariantViolation` when the tensor is not `[1, 1, h, w]` with a
    ///   nonzero plane, or when the target size is zero
    pub fn decode(
        raw: &Array4<f32>,
        target_width: u32,
        target_height: u32,
        interpolation: Interpolation,
    ) -> Result<Mask> {
        let plane = Self::clamped_plane(raw)?;

        if target_width == 0 || target_height == 0 {
            return Err(SnapEraseError::invariant(format!(
                "mask target size {target_width}x{target_height} has zero area"
            )));
        }

        let resized = image::imageops::resize(
            &plane,
            target_width,
            target_height,
            interpolation.filter_type(),
        );

        Mask::new(resized.into_raw(), target_width, target_height)
    }

    /// Validate the output shape and copy its plane into a clamped image buffer
    fn clamped_plane(raw: &Array4<f32>) -> Result<ProbabilityPlane> {
        let (batch, channels, height, width) = raw.dim();
        if batch != 1 || channels != 1 || height == 0 || width == 0 {
            return Err(SnapEraseError::invariant(format!(
                "model output has shape {:?}, expected [1, 1, h, w]",
                raw.shape()
            )));
        }

        let values: Vec<f32> = raw
            .slice(s![0, 0, .., ..])
            .iter()
            .copied()
            .map(clamp_probability)
            .collect();

        let plane_width = u32::try_from(width)
            .map_err(|_| SnapEraseError::invariant("model output width exceeds u32"))?;
        let plane_height = u32::try_from(height)
            .map_err(|_| SnapEraseError::invariant("model output height exceeds u32"))?;

        ImageBuffer::from_raw(plane_width, plane_height, values).ok_or_else(|| {
            SnapEraseError::invariant("model output plane does not fit its own dimensions")
        })
    }
}
