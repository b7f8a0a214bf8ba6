//! Deterministic in-process backend
//!
//! Produces a synthetic confidence surface without loading any model. Used by
//! the test suites and benchmarks, and handy for exercising the pipeline on a
//! machine without model artifacts.

use crate::{
    config::ModelConfig,
    error::{Result, SnapEraseError},
    inference::InferenceBackend,
};
use instant::Duration;
use ndarray::Array4;
use std::fmt;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Surface generator: `(x, y, side) -> raw confidence`
pub type SurfaceFn = Arc<dyn Fn(usize, usize, usize) -> f32 + Send + Sync>;

#[derive(Clone)]
enum Surface {
    Constant(f32),
    Radial,
    Custom(SurfaceFn),
}

/// Counters shared between a stub and the test that created it
#[derive(Debug, Default)]
pub struct StubProbe {
    initializations: AtomicUsize,
    inferences: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubProbe {
    /// Number of `initialize` calls that loaded the model
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Number of `infer` calls, including failing ones
    pub fn inferences(&self) -> usize {
        self.inferences.load(Ordering::SeqCst)
    }

    /// Highest number of `infer` calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Synthetic backend with a configurable output surface and failure modes
#[derive(Clone)]
pub struct StubBackend {
    config: ModelConfig,
    surface: Surface,
    output_shape: Option<(usize, usize, usize, usize)>,
    fail_init: bool,
    fail_inference: bool,
    latency: Option<Duration>,
    initialized: bool,
    probe: Arc<StubProbe>,
}

impl fmt::Debug for StubBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubBackend")
            .field("model", &self.config.name)
            .field("initialized", &self.initialized)
            .field("fail_init", &self.fail_init)
            .field("fail_inference", &self.fail_inference)
            .finish_non_exhaustive()
    }
}

impl StubBackend {
    fn with_surface(config: ModelConfig, surface: Surface) -> Self {
        Self {
            config,
            surface,
            output_shape: None,
            fail_init: false,
            fail_inference: false,
            latency: None,
            initialized: false,
            probe: Arc::new(StubProbe::default()),
        }
    }

    /// Every output value equals `value` (it may lie outside `[0, 1]`)
    #[must_use]
    pub fn constant(config: ModelConfig, value: f32) -> Self {
        Self::with_surface(config, Surface::Constant(value))
    }

    /// Soft disc centered in the frame, fading to zero at a third of the side
    #[must_use]
    pub fn radial(config: ModelConfig) -> Self {
        Self::with_surface(config, Surface::Radial)
    }

    /// Output computed per model-resolution pixel by `surface(x, y, side)`
    #[must_use]
    pub fn from_fn<F>(config: ModelConfig, surface: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f32 + Send + Sync + 'static,
    {
        Self::with_surface(config, Surface::Custom(Arc::new(surface)))
    }

    /// Fail `initialize` with `ModelUnavailable`
    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Fail every `infer` with `InferenceFailure`
    #[must_use]
    pub fn failing_inference(mut self) -> Self {
        self.fail_inference = true;
        self
    }

    /// Emit tensors of this shape instead of `[1, 1, S, S]`
    #[must_use]
    pub fn with_output_shape(mut self, shape: (usize, usize, usize, usize)) -> Self {
        self.output_shape = Some(shape);
        self
    }

    /// Sleep this long inside every `infer`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared counters for assertions
    #[must_use]
    pub fn probe(&self) -> Arc<StubProbe> {
        Arc::clone(&self.probe)
    }

    fn value_at(&self, x: usize, y: usize, side: usize) -> f32 {
        match &self.surface {
            Surface::Constant(value) => *value,
            Surface::Radial => {
                #[allow(clippy::cast_precision_loss)]
                let (x, y, side) = (x as f32, y as f32, side as f32);
                let center = side / 2.0;
                let radius = (side / 3.0).max(1.0);
                let distance = (x - center).hypot(y - center);
                ((radius - distance) / radius).clamp(0.0, 1.0)
            },
            Surface::Custom(surface) => surface(x, y, side),
        }
    }

    fn generate(&self) -> Array4<f32> {
        let shape = self
            .output_shape
            .unwrap_or_else(|| self.config.output_shape());
        let side = shape.2;
        Array4::from_shape_fn(shape, |(_, _, y, x)| self.value_at(x, y, side))
    }
}

impl InferenceBackend for StubBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.fail_init {
            return Err(SnapEraseError::model_unavailable(format!(
                "stub model '{}' refused to load",
                self.config.name
            )));
        }
        if self.initialized {
            return Ok(None);
        }
        self.probe.initializations.fetch_add(1, Ordering::SeqCst);
        self.initialized = true;
        Ok(Some(Duration::ZERO))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let in_flight = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.probe.inferences.fetch_add(1, Ordering::SeqCst);

        let result = self.run(input);

        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

impl StubBackend {
    fn run(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(SnapEraseError::invariant("stub backend used before initialize"));
        }
        if input.dim() != self.config.input_shape() {
            return Err(SnapEraseError::invariant(format!(
                "stub received input {:?}, expected {:?}",
                input.dim(),
                self.config.input_shape()
            )));
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.fail_inference {
            return Err(SnapEraseError::inference("stub inference failed"));
        }
        Ok(self.generate())
    }
}
