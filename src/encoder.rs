//! Tensor encoding: decoded photograph to normalized model input
//!
//! The photograph is stretched to the model's square input side (aspect ratio is
//! not preserved, the mask is stretched back the same way) and every channel is
//! normalized with the model's own statistics into an NCHW tensor.

use crate::{
    config::ModelConfig,
    error::{Result, SnapEraseError},
    types::SourceImage,
};
use image::RgbImage;
use ndarray::Array4;

/// Converts source images into `[1, 3, S, S]` input tensors
pub struct TensorEncoder;

impl TensorEncoder {
    /// Encode an image for inference
    ///
    /// # Arguments
    /// * `image` - Decoded source photograph
    /// * `model` - Input contract of the bound model (side, mean, std, kernel)
    ///
    /// # Returns
    /// * `Ok(tensor)` - Channel-major tensor of shape `[1, 3, S, S]`
    /// * `Err(SnapEraseError::InvalidInput)` - Zero width or height, checked
    ///   before anything is resized or allocated
    pub fn encode(image: &SourceImage, model: &ModelConfig) -> Result<Array4<f32>> {
        if image.is_empty() {
            return Err(SnapEraseError::invalid_input(format!(
                "image has zero area ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let side = model.input_size;
        if side == 0 {
            return Err(SnapEraseError::invalid_config("model input size is zero"));
        }

        let resized = image::imageops::resize(
            image.pixels(),
            side,
            side,
            model.interpolation.filter_type(),
        );

        Ok(Self::normalize_to_tensor(&resized, model))
    }

    /// Normalize a square RGB canvas into an NCHW tensor
    fn normalize_to_tensor(canvas: &RgbImage, model: &ModelConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        let mean = model.normalization_mean;
        let std = model.normalization_std;

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / 255.0;
                tensor[[0, channel, y, x]] = (value - mean[channel]) / std[channel];
            }
        }

        tensor
    }
}
