//! Tract backend for saliency segmentation models
//!
//! Pure Rust inference with no native runtime to install. Slower than ONNX
//! Runtime on large inputs, but runs anywhere the crate compiles.

use crate::config::ModelConfig;
use crate::error::{Result, SnapEraseError};
use crate::inference::{to_nchw, InferenceBackend};
use crate::models::ModelSpec;
use instant::{Duration, Instant};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the optimized runnable Tract graph
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend bound to one model artifact
#[derive(Debug)]
pub struct TractBackend {
    spec: ModelSpec,
    model: Option<TractModel>,
}

impl TractBackend {
    /// List Tract execution providers; only the CPU exists
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a backend for a model; nothing is loaded until [`InferenceBackend::initialize`]
    #[must_use]
    pub fn new(spec: ModelSpec) -> Self {
        Self { spec, model: None }
    }

    /// Model this backend is bound to
    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn load_model(&mut self) -> Result<Duration> {
        let start = Instant::now();
        let model_data = self.spec.load_bytes()?;
        let side = self.spec.config.input_size as usize;

        log::info!("🚀 Initializing Tract backend");
        log::info!("🧠 Model: {}", self.spec.display_name());
        #[allow(clippy::cast_precision_loss)] // Display only
        let size_mb = model_data.len() as f64 / (1024.0 * 1024.0);
        log::debug!("📏 Model size: {size_mb:.2} MB");

        // Pin the input fact so exports with symbolic dimensions optimize
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| load_error(&self.spec, "parse", &e))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| load_error(&self.spec, "set input shape of", &e))?
            .into_optimized()
            .map_err(|e| load_error(&self.spec, "optimize", &e))?
            .into_runnable()
            .map_err(|e| load_error(&self.spec, "prepare", &e))?;

        self.model = Some(model);

        let elapsed = start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            elapsed.as_millis()
        );
        Ok(elapsed)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| SnapEraseError::invariant("Tract model used before initialize"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| SnapEraseError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SnapEraseError::inference("No output tensor found"))?
            .into_arc_tensor();
        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            SnapEraseError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let shape = output_view.shape().to_vec();
        let result = to_nchw(&shape, output_view.iter().copied().collect())?;

        log::debug!(
            "✅ Tract inference completed in {}ms, output {:?}",
            start.elapsed().as_millis(),
            result.shape()
        );
        Ok(result)
    }

    fn model_config(&self) -> &ModelConfig {
        &self.spec.config
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}

fn load_error(spec: &ModelSpec, operation: &str, error: &dyn std::fmt::Display) -> SnapEraseError {
    SnapEraseError::model_error_with_context(
        operation,
        &spec.path,
        &error.to_string(),
        &["verify the file is a valid ONNX model"],
    )
}
