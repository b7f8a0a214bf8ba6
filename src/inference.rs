//! Inference backend abstraction
//!
//! Everything model-specific sits behind [`InferenceBackend`]: the pipeline hands
//! over a `[1, 3, S, S]` tensor and gets a `[1, 1, S, S]` tensor back. Nothing
//! else about the network is assumed.

use crate::{
    config::ModelConfig,
    error::{Result, SnapEraseError},
};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
pub trait InferenceBackend: Send {
    /// Load the model so that `infer` can run
    ///
    /// Returns the model load time, or `None` when the backend was already
    /// initialized.
    ///
    /// # Errors
    /// - `ModelUnavailable` when the model artifact cannot be located or loaded
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - `InferenceFailure` for any runtime error during prediction
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Input contract of the bound model
    fn model_config(&self) -> &ModelConfig;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Get the expected input shape for this backend
    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_config().input_shape()
    }

    /// Get the expected output shape for this backend
    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_config().output_shape()
    }
}

/// Verify that a tensor has the shape a backend declared
///
/// # Errors
/// - `InternalInvariantViolation` on any mismatch
pub fn ensure_shape(
    tensor: &Array4<f32>,
    expected: (usize, usize, usize, usize),
    what: &str,
) -> Result<()> {
    if tensor.dim() == expected {
        Ok(())
    } else {
        Err(SnapEraseError::invariant(format!(
            "{what} tensor has shape {:?}, expected {:?}",
            tensor.dim(),
            expected
        )))
    }
}

/// Extract a 4D `f32` array from a runtime output of arbitrary rank
///
/// Some exports drop the batch or channel axis; a `[S, S]` or `[1, S, S]`
/// output is widened back to `[1, 1, S, S]`.
///
/// # Errors
/// - `InferenceFailure` when the output is not 2D, 3D or 4D
pub(crate) fn to_nchw(shape: &[usize], data: Vec<f32>) -> Result<Array4<f32>> {
    let dims = match *shape {
        [n, c, h, w] => (n, c, h, w),
        [c, h, w] => (1, c, h, w),
        [h, w] => (1, 1, h, w),
        _ => {
            return Err(SnapEraseError::inference(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )))
        },
    };

    Array4::from_shape_vec(dims, data).map_err(|e| {
        SnapEraseError::inference(format!("Failed to reshape output tensor: {e}"))
    })
}
