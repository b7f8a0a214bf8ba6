//! ONNX Runtime backend for saliency segmentation models
//!
//! Runs the bound model through ONNX Runtime with an optional hardware execution
//! provider (CUDA, CoreML) and falls back to the CPU when none is available.

use crate::config::{ExecutionProvider, ModelConfig};
use crate::error::{Result, SnapEraseError};
use crate::inference::{to_nchw, InferenceBackend};
use crate::models::ModelSpec;
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};
use ort::{self, value::Value};

/// ONNX Runtime backend bound to one model artifact
#[derive(Debug)]
pub struct OnnxBackend {
    spec: ModelSpec,
    provider: ExecutionProvider,
    intra_threads: usize,
    inter_threads: usize,
    session: Option<Session>,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability and a description
    ///
    /// # Examples
    /// ```rust,no_run
    /// use snap_erase::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "yes" } else { "no" }, description);
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!(
            "🔍 Checking execution providers on {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        let cuda_available = cuda_available();
        let coreml_available = coreml_available();
        log::debug!("  - CUDA: {cuda_available}, CoreML: {coreml_available}");

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a backend for a model; nothing is loaded until [`InferenceBackend::initialize`]
    ///
    /// A thread count of 0 picks a value from the available parallelism.
    #[must_use]
    pub fn new(
        spec: ModelSpec,
        provider: ExecutionProvider,
        intra_threads: usize,
        inter_threads: usize,
    ) -> Self {
        Self {
            spec,
            provider,
            intra_threads,
            inter_threads,
            session: None,
        }
    }

    /// Model this backend is bound to
    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn resolved_threads(&self) -> (usize, usize) {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra = if self.intra_threads > 0 {
            self.intra_threads
        } else {
            cores
        };
        let inter = if self.inter_threads > 0 {
            self.inter_threads
        } else {
            (cores / 4).max(1)
        };
        (intra, inter)
    }

    /// Hardware providers to register for the requested mode, in priority order
    fn hardware_providers(&self) -> Vec<ExecutionProviderDispatch> {
        let mut providers = Vec::new();
        match self.provider {
            ExecutionProvider::Auto => {
                if cuda_available() {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::warn!("⚠️ No hardware acceleration available, falling back to CPU");
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
            },
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    log::info!("Using CUDA execution provider");
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }
        providers
    }

    fn session_builder(&self) -> Result<SessionBuilder> {
        let builder = Session::builder()
            .map_err(|e| load_error(&self.spec, "create session builder", &e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(&self.spec, "set optimization level", &e))?;

        let providers = self.hardware_providers();
        if providers.is_empty() {
            return Ok(builder);
        }
        builder
            .with_execution_providers(providers)
            .map_err(|e| load_error(&self.spec, "register execution providers", &e))
    }

    fn load_model(&mut self) -> Result<Duration> {
        let start = Instant::now();
        let model_data = self.spec.load_bytes()?;
        let (intra_threads, inter_threads) = self.resolved_threads();

        let session = self
            .session_builder()?
            .with_parallel_execution(true)
            .map_err(|e| load_error(&self.spec, "enable parallel execution", &e))?
            .with_intra_threads(intra_threads)
            .map_err(|e| load_error(&self.spec, "set intra threads", &e))?
            .with_inter_threads(inter_threads)
            .map_err(|e| load_error(&self.spec, "set inter threads", &e))?
            .commit_from_memory(&model_data)
            .map_err(|e| load_error(&self.spec, "create session from model data", &e))?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Model: {}", self.spec.display_name());
        log::debug!("  - Requested provider: {}", self.provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        #[allow(clippy::cast_precision_loss)] // Display only
        let size_mb = model_data.len() as f64 / (1024.0 * 1024.0);
        log::debug!("  - Model size: {size_mb:.2} MB");

        self.session = Some(session);

        let elapsed = start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            elapsed.as_secs_f64() * 1000.0
        );
        Ok(elapsed)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SnapEraseError::invariant("ONNX session used before initialize"))?;

        let start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            SnapEraseError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional input and output access avoids depending on tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| SnapEraseError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| SnapEraseError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| SnapEraseError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                SnapEraseError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        let shape = output_tensor.shape().to_vec();
        let data = output_tensor.iter().copied().collect();
        let result = to_nchw(&shape, data)?;

        log::info!(
            "📊 Inference complete: {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    fn model_config(&self) -> &ModelConfig {
        &self.spec.config
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

fn cuda_available() -> bool {
    OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
}

fn coreml_available() -> bool {
    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
}

fn load_error(spec: &ModelSpec, operation: &str, error: &dyn std::fmt::Display) -> SnapEraseError {
    SnapEraseError::model_error_with_context(
        operation,
        &spec.path,
        &error.to_string(),
        &["verify the file is a valid ONNX model"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_backend_is_not_initialized() {
        let backend = OnnxBackend::new(
            ModelSpec::new("/models/u2net.onnx", ModelConfig::u2net()),
            ExecutionProvider::Cpu,
            0,
            0,
        );
        assert!(!backend.is_initialized());
        assert_eq!(backend.name(), "onnx");
        assert_eq!(backend.input_shape(), (1, 3, 320, 320));
        assert_eq!(backend.output_shape(), (1, 1, 320, 320));
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let mut backend = OnnxBackend::new(
            ModelSpec::new("/nonexistent/u2net.onnx", ModelConfig::u2net()),
            ExecutionProvider::Cpu,
            1,
            1,
        );
        let err = backend.initialize().unwrap_err();
        assert!(matches!(err, SnapEraseError::ModelUnavailable(_)));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_infer_before_initialize_is_internal_error() {
        let mut backend = OnnxBackend::new(
            ModelSpec::new("/models/u2net.onnx", ModelConfig::u2net()),
            ExecutionProvider::Cpu,
            0,
            0,
        );
        let err = backend
            .infer(&Array4::<f32>::zeros((1, 3, 320, 320)))
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_explicit_thread_counts_are_kept() {
        let backend = OnnxBackend::new(
            ModelSpec::new("/models/u2net.onnx", ModelConfig::u2net()),
            ExecutionProvider::Cpu,
            3,
            2,
        );
        assert_eq!(backend.resolved_threads(), (3, 2));
    }

    #[test]
    fn test_list_providers_always_has_cpu() {
        let providers = OnnxBackend::list_providers();
        assert!(providers
            .iter()
            .any(|(name, available, _)| name == "CPU" && *available));
    }
}
