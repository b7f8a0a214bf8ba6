#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Snap Erase
//!
//! Background removal for photographs with U2-Net style saliency segmentation
//! models, running on ONNX Runtime or Tract.
//!
//! A run is four stages over one image:
//!
//! 1. [`TensorEncoder`] stretches the photograph to the model's square input and
//!    normalizes it into a `[1, 3, S, S]` tensor.
//! 2. An [`InferenceBackend`] turns that tensor into a `[1, 1, S, S]` confidence
//!    surface.
//! 3. [`MaskDecoder`] clamps the surface into `[0, 1]` and resamples it to the
//!    photograph's resolution.
//! 4. [`Compositor`] writes the mask into the alpha channel, leaving colors as
//!    they were.
//!
//! [`BackgroundRemovalProcessor`] sequences the stages and owns the backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snap_erase::{
//!     BackgroundRemovalProcessor, BackendType, ImageIo, ModelSpec, ProcessorConfig,
//! };
//!
//! # fn example() -> snap_erase::Result<()> {
//! let config = ProcessorConfig::builder()
//!     .model_spec(ModelSpec::from_path("models/u2net.onnx")?)
//!     .backend_type(BackendType::Onnx)
//!     .build()?;
//! let processor = BackgroundRemovalProcessor::new(config)?;
//!
//! let photo = ImageIo::load("portrait.jpg")?;
//! let result = processor.remove_background(&photo)?;
//! result.save_png("portrait_no_bg.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with CUDA and `CoreML` providers
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): `snap-erase` binary and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

pub use backends::{
    create_backend, BackendFactory, BackendOptions, BackendType, DefaultBackendFactory,
    StubBackend, StubProbe,
};
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use compositor::Compositor;
pub use config::{ExecutionProvider, Interpolation, ModelConfig};
pub use decoder::MaskDecoder;
pub use encoder::TensorEncoder;
pub use error::{Result, SnapEraseError};
pub use inference::InferenceBackend;
pub use models::ModelSpec;
pub use processor::{BackgroundRemovalProcessor, ProcessorConfig, ProcessorConfigBuilder};
pub use services::ImageIo;
pub use tokio_util::sync::CancellationToken;
pub use types::{
    Mask, MaskStatistics, ProcessingMetadata, ProcessingTimings, ResultImage, SourceImage,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, spans, TracingConfig, TracingFormat};

/// Remove the background of one image with a one-off processor
///
/// Loads the model, runs the pipeline once and drops the backend. Keep a
/// [`BackgroundRemovalProcessor`] around instead when processing more than one
/// image.
///
/// # Errors
/// - Any error of [`BackgroundRemovalProcessor::new`] or
///   [`BackgroundRemovalProcessor::remove_background`]
pub fn remove_background(image: &SourceImage, config: ProcessorConfig) -> Result<ResultImage> {
    BackgroundRemovalProcessor::new(config)?.remove_background(image)
}

/// Async variant of [`remove_background`], running on the tokio blocking pool
///
/// # Errors
/// - Any error of [`remove_background`]
pub async fn remove_background_async(
    image: SourceImage,
    config: ProcessorConfig,
) -> Result<ResultImage> {
    let processor = std::sync::Arc::new(BackgroundRemovalProcessor::new(config)?);
    processor.remove_background_async(image).await
}
