//! Background removal processor
//!
//! Sequences the pipeline for one image at a time:
//! encode → infer → decode mask → composite. The backend sits behind a mutex,
//! so a processor shared between threads runs at most one inference at a time
//! while encoding and compositing of other runs proceed in parallel.

use crate::{
    backends::{BackendFactory, BackendOptions, BackendType, DefaultBackendFactory},
    compositor::Compositor,
    config::{ExecutionProvider, ModelConfig},
    decoder::MaskDecoder,
    encoder::TensorEncoder,
    error::{Result, SnapEraseError},
    inference::{ensure_shape, InferenceBackend},
    models::ModelSpec,
    services::ImageIo,
    types::{Mask, ProcessingMetadata, ProcessingTimings, ResultImage, SourceImage},
};
use image::RgbaImage;
use instant::{Duration, Instant};
use log::{debug, info};
use ndarray::Array4;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, span, trace, Level};

/// Largest thread count accepted for either thread pool
const MAX_THREADS: usize = 1024;

/// Unified configuration for the background removal processor
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Model artifact and its input contract
    pub model_spec: ModelSpec,
    /// Backend type to use for inference
    pub backend_type: BackendType,
    /// Execution provider for the ONNX backend
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Log per-stage details at info level
    pub debug: bool,
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Options handed to the backend factory
    #[must_use]
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            execution_provider: self.execution_provider,
            intra_threads: self.intra_threads,
            inter_threads: self.inter_threads,
        }
    }

    /// Check the configuration for values no backend can run with
    ///
    /// # Errors
    /// - `InvalidConfig` for an invalid model contract or thread count
    pub fn validate(&self) -> Result<()> {
        self.model_spec.config.validate()?;
        if self.intra_threads > MAX_THREADS {
            return Err(SnapEraseError::config_value_error(
                "intra_threads",
                self.intra_threads,
                "0-1024",
            ));
        }
        if self.inter_threads > MAX_THREADS {
            return Err(SnapEraseError::config_value_error(
                "inter_threads",
                self.inter_threads,
                "0-1024",
            ));
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::new("u2net.onnx", ModelConfig::u2net()),
            backend_type: BackendType::Onnx,
            execution_provider: ExecutionProvider::Auto,
            intra_threads: 0,
            inter_threads: 0,
            debug: false,
        }
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    /// Replace only the input contract of the current model spec
    #[must_use]
    pub fn model_config(mut self, model_config: ModelConfig) -> Self {
        self.config.model_spec.config = model_config;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - `InvalidConfig` when [`ProcessorConfig::validate`] fails
    pub fn build(self) -> Result<ProcessorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Per-run buffers, released when the run ends on any path
#[derive(Debug, Default)]
struct RunScratch {
    input: Option<Array4<f32>>,
    raw: Option<Array4<f32>>,
    mask: Option<Mask>,
}

impl RunScratch {
    fn held_bytes(&self) -> usize {
        let tensor_bytes = |t: &Option<Array4<f32>>| t.as_ref().map_or(0, |t| t.len() * 4);
        tensor_bytes(&self.input)
            + tensor_bytes(&self.raw)
            + self.mask.as_ref().map_or(0, |m| m.values().len() * 4)
    }
}

impl Drop for RunScratch {
    fn drop(&mut self) {
        trace!(bytes = self.held_bytes(), "released run scratch");
    }
}

struct InferenceOutcome {
    output: Array4<f32>,
    inference_ms: u64,
    load_time: Option<Duration>,
}

/// Background removal processor bound to one model and backend
pub struct BackgroundRemovalProcessor {
    config: ProcessorConfig,
    model: ModelConfig,
    backend_name: &'static str,
    backend: Mutex<Box<dyn InferenceBackend>>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("backend", &self.backend_name)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor with the backends compiled into this crate
    ///
    /// The model is not loaded until the first run or an explicit [`Self::initialize`].
    ///
    /// # Errors
    /// - `InvalidConfig` for an invalid configuration or a backend that is not compiled in
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory)
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - `InvalidConfig` for an invalid configuration or a factory refusal
    pub fn with_factory(config: ProcessorConfig, factory: &dyn BackendFactory) -> Result<Self> {
        config.validate()?;
        let backend = factory.create_backend(
            config.backend_type,
            config.model_spec.clone(),
            config.backend_options(),
        )?;
        Self::with_backend(config, backend)
    }

    /// Create a processor around an existing backend
    ///
    /// The backend's model contract wins over `config.model_spec.config`.
    ///
    /// # Errors
    /// - `InvalidConfig` when the backend's model contract is invalid
    pub fn with_backend(
        mut config: ProcessorConfig,
        backend: Box<dyn InferenceBackend>,
    ) -> Result<Self> {
        let model = backend.model_config().clone();
        model.validate()?;
        if model != config.model_spec.config {
            debug!(
                "Backend model contract '{}' replaces configured '{}'",
                model.name, config.model_spec.config.name
            );
            config.model_spec.config = model.clone();
        }

        Ok(Self {
            config,
            model,
            backend_name: backend.name(),
            backend: Mutex::new(backend),
        })
    }

    /// Create a processor with default settings around a backend
    ///
    /// # Errors
    /// - `InvalidConfig` when the backend's model contract is invalid
    pub fn from_backend<B: InferenceBackend + 'static>(backend: B) -> Result<Self> {
        Self::with_backend(ProcessorConfig::default(), Box::new(backend))
    }

    /// Load the model now instead of on the first run
    ///
    /// Returns the load time, or `None` when the model was already loaded.
    ///
    /// # Errors
    /// - `ModelUnavailable` when the backend cannot load the model
    pub fn initialize(&self) -> Result<Option<Duration>> {
        let mut backend = self.lock_backend()?;
        Self::ensure_initialized(&mut **backend, &self.model)
    }

    /// Check if the backend has loaded its model
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend
            .lock()
            .map(|backend| backend.is_initialized())
            .unwrap_or(false)
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Input contract of the bound model
    #[must_use]
    pub fn model_config(&self) -> &ModelConfig {
        &self.model
    }

    /// Remove the background of one image
    ///
    /// # Errors
    /// - `InvalidInput` for a zero-area image, before the backend is touched
    /// - `ModelUnavailable` when the model cannot be loaded
    /// - `InferenceFailure` when the backend fails
    /// - `InternalInvariantViolation` when a stage hands over a malformed buffer
    pub fn remove_background(&self, image: &SourceImage) -> Result<ResultImage> {
        self.run(image, None)
    }

    /// Remove the background, stopping between stages once `cancel` fires
    ///
    /// # Errors
    /// - `Cancelled` when the token fired before a stage started
    /// - Any error of [`Self::remove_background`]
    pub fn remove_background_with_cancel(
        &self,
        image: &SourceImage,
        cancel: &CancellationToken,
    ) -> Result<ResultImage> {
        self.run(image, Some(cancel))
    }

    /// Run [`Self::remove_background`] on the tokio blocking pool
    ///
    /// # Errors
    /// - Any error of [`Self::remove_background`]
    /// - `InternalInvariantViolation` when the blocking task panicked
    pub async fn remove_background_async(self: Arc<Self>, image: SourceImage) -> Result<ResultImage> {
        tokio::task::spawn_blocking(move || self.remove_background(&image))
            .await
            .map_err(|e| SnapEraseError::invariant(format!("processing task failed: {e}")))?
    }

    /// Run [`Self::remove_background_with_cancel`] on the tokio blocking pool
    ///
    /// # Errors
    /// - Any error of [`Self::remove_background_with_cancel`]
    /// - `InternalInvariantViolation` when the blocking task panicked
    pub async fn remove_background_async_with_cancel(
        self: Arc<Self>,
        image: SourceImage,
        cancel: CancellationToken,
    ) -> Result<ResultImage> {
        tokio::task::spawn_blocking(move || self.remove_background_with_cancel(&image, &cancel))
            .await
            .map_err(|e| SnapEraseError::invariant(format!("processing task failed: {e}")))?
    }

    /// Decode an image file and remove its background
    ///
    /// # Errors
    /// - `Io` or `Image` when the file cannot be read or decoded
    /// - Any error of [`Self::remove_background`]
    pub fn process_file<P: AsRef<Path>>(&self, input_path: P) -> Result<ResultImage> {
        let image = ImageIo::load(input_path)?;
        self.remove_background(&image)
    }

    /// Decode an in-memory image and remove its background
    ///
    /// # Errors
    /// - `Image` when the bytes cannot be decoded
    /// - Any error of [`Self::remove_background`]
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<ResultImage> {
        let image = ImageIo::load_from_bytes(image_bytes)?;
        self.remove_background(&image)
    }

    #[instrument(
        skip(self, image, cancel),
        fields(
            backend = self.backend_name,
            model = %self.model.name,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    fn run(&self, image: &SourceImage, cancel: Option<&CancellationToken>) -> Result<ResultImage> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let mut scratch = RunScratch::default();
        let (width, height) = image.dimensions();

        checkpoint(cancel, "encoding")?;
        {
            let _span = span!(Level::DEBUG, "preprocessing", width, height).entered();
            let start = Instant::now();
            scratch.input = Some(TensorEncoder::encode(image, &self.model)?);
            timings.preprocessing_ms = elapsed_ms(start);
        }

        checkpoint(cancel, "inference")?;
        {
            let _span = span!(Level::INFO, "inference", backend = self.backend_name).entered();
            let input = scratch
                .input
                .as_ref()
                .ok_or_else(|| SnapEraseError::invariant("encoded tensor missing"))?;
            let outcome = self.infer(input)?;
            timings.model_load_ms = outcome.load_time.map_or(0, |d| d.as_millis() as u64);
            timings.inference_ms = outcome.inference_ms;
            scratch.raw = Some(outcome.output);
            scratch.input = None;
        }

        checkpoint(cancel, "mask decoding")?;
        let postprocess_start = Instant::now();
        {
            let _span = span!(Level::DEBUG, "mask_decoding", width, height).entered();
            let raw = scratch
                .raw
                .as_ref()
                .ok_or_else(|| SnapEraseError::invariant("raw mask tensor missing"))?;
            scratch.mask = Some(MaskDecoder::decode(
                raw,
                width,
                height,
                self.model.interpolation,
            )?);
            scratch.raw = None;
        }

        checkpoint(cancel, "compositing")?;
        let composited: RgbaImage = {
            let _span = span!(Level::DEBUG, "compositing", width, height).entered();
            let mask = scratch
                .mask
                .as_ref()
                .ok_or_else(|| SnapEraseError::invariant("decoded mask missing"))?;
            if self.config.debug {
                let stats = mask.statistics();
                info!(
                    "Mask foreground {:.1}%, background {:.1}%",
                    stats.foreground_ratio * 100.0,
                    stats.background_ratio * 100.0
                );
            }
            Compositor::composite(image, mask)?
        };
        drop(scratch);

        timings.postprocessing_ms = elapsed_ms(postprocess_start);
        timings.total_ms = elapsed_ms(total_start);

        if self.config.debug {
            info!("Processed {width}x{height}: {}", timings.summary());
        } else {
            debug!("Processed {width}x{height}: {}", timings.summary());
        }

        Ok(ResultImage::new(
            composited,
            ProcessingMetadata::new(self.model.name.clone(), timings),
        ))
    }

    /// Run the backend under the lock, loading the model first if needed
    fn infer(&self, input: &Array4<f32>) -> Result<InferenceOutcome> {
        let mut backend = self.lock_backend()?;
        let load_time = Self::ensure_initialized(&mut **backend, &self.model)?;

        ensure_shape(input, backend.input_shape(), "input")?;
        let start = Instant::now();
        let output = backend.infer(input)?;
        let inference_ms = elapsed_ms(start);
        ensure_shape(&output, backend.output_shape(), "output")?;

        Ok(InferenceOutcome {
            output,
            inference_ms,
            load_time,
        })
    }

    fn ensure_initialized(
        backend: &mut dyn InferenceBackend,
        model: &ModelConfig,
    ) -> Result<Option<Duration>> {
        if backend.is_initialized() {
            return Ok(None);
        }
        info!(
            "Loading model '{}' on {} backend",
            model.name,
            backend.name()
        );
        backend.initialize()
    }

    fn lock_backend(&self) -> Result<MutexGuard<'_, Box<dyn InferenceBackend>>> {
        self.backend
            .lock()
            .map_err(|_| SnapEraseError::invariant("inference backend lock poisoned"))
    }
}

fn checkpoint(cancel: Option<&CancellationToken>, stage: &str) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => {
            debug!("Run cancelled before {stage}");
            Err(SnapEraseError::Cancelled(stage.to_string()))
        },
        _ => Ok(()),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::StubBackend;
    use image::{Rgb, RgbImage};

    fn small_model() -> ModelConfig {
        ModelConfig {
            name: "small".to_string(),
            input_size: 16,
            ..ModelConfig::u2net()
        }
    }

    fn image(width: u32, height: u32) -> SourceImage {
        SourceImage::new(RgbImage::from_pixel(width, height, Rgb([10, 200, 30])))
    }

    #[test]
    fn test_processor_config_builder_chain() {
        let config = ProcessorConfigBuilder::new()
            .model_spec(ModelSpec::new("/models/u2netp.onnx", ModelConfig::u2netp()))
            .backend_type(BackendType::Tract)
            .execution_provider(ExecutionProvider::Cpu)
            .intra_threads(4)
            .inter_threads(1)
            .debug(true)
            .build()
            .unwrap();

        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.model_spec.config.name, "u2netp");
        assert_eq!(
            config.backend_options(),
            BackendOptions {
                execution_provider: ExecutionProvider::Cpu,
                intra_threads: 4,
                inter_threads: 1,
            }
        );
        assert!(config.debug);
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        let result = ProcessorConfigBuilder::new().intra_threads(5000).build();
        assert!(matches!(result, Err(SnapEraseError::InvalidConfig(_))));

        let result = ProcessorConfigBuilder::new()
            .model_config(ModelConfig {
                input_size: 0,
                ..ModelConfig::u2net()
            })
            .build();
        assert!(matches!(result, Err(SnapEraseError::InvalidConfig(_))));
    }

    #[test]
    fn test_backend_contract_replaces_configured_one() {
        let processor =
            BackgroundRemovalProcessor::from_backend(StubBackend::constant(small_model(), 1.0))
                .unwrap();
        assert_eq!(processor.model_config(), &small_model());
        assert_eq!(processor.config().model_spec.config, small_model());
    }

    #[test]
    fn test_lazy_initialization() {
        let stub = StubBackend::constant(small_model(), 1.0);
        let probe = stub.probe();
        let processor = BackgroundRemovalProcessor::from_backend(stub).unwrap();
        assert!(!processor.is_initialized());

        processor.remove_background(&image(5, 7)).unwrap();
        processor.remove_background(&image(5, 7)).unwrap();
        assert!(processor.is_initialized());
        assert_eq!(probe.initializations(), 1);
        assert_eq!(probe.inferences(), 2);
        assert_eq!(processor.initialize().unwrap(), None);
    }

    #[test]
    fn test_metadata_names_model() {
        let processor =
            BackgroundRemovalProcessor::from_backend(StubBackend::radial(small_model())).unwrap();
        let result = processor.remove_background(&image(9, 4)).unwrap();
        assert_eq!(result.metadata().model_name, "small");
        assert_eq!(result.dimensions(), (9, 4));
    }

    #[test]
    fn test_unexpected_output_shape_is_internal_error() {
        let stub = StubBackend::constant(small_model(), 1.0).with_output_shape((1, 1, 8, 8));
        let processor = BackgroundRemovalProcessor::from_backend(stub).unwrap();
        let err = processor.remove_background(&image(4, 4)).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_init_failure_surfaces_unchanged() {
        let stub = StubBackend::constant(small_model(), 1.0).failing_init();
        let probe = stub.probe();
        let processor = BackgroundRemovalProcessor::from_backend(stub).unwrap();

        let err = processor.remove_background(&image(4, 4)).unwrap_err();
        assert!(matches!(err, SnapEraseError::ModelUnavailable(_)));
        assert_eq!(probe.inferences(), 0);
    }

    #[test]
    fn test_cancelled_token_stops_before_encoding() {
        let stub = StubBackend::constant(small_model(), 1.0);
        let probe = stub.probe();
        let processor = BackgroundRemovalProcessor::from_backend(stub).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = processor
            .remove_background_with_cancel(&image(4, 4), &token)
            .unwrap_err();
        assert!(matches!(err, SnapEraseError::Cancelled(ref stage) if stage == "encoding"));
        assert_eq!(probe.inferences(), 0);
    }

    #[test]
    fn test_scratch_accounts_for_held_buffers() {
        let mut scratch = RunScratch::default();
        assert_eq!(scratch.held_bytes(), 0);

        scratch.input = Some(Array4::zeros((1, 3, 4, 4)));
        scratch.mask = Some(Mask::new(vec![0.5; 6], 3, 2).unwrap());
        assert_eq!(scratch.held_bytes(), (48 + 6) * 4);
    }
}
