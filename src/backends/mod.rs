//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (high performance, GPU acceleration)
//! - Tract backend (pure Rust, no external dependencies)
//! - Stub backend (synthetic output, no model)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub mod stub;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

pub use self::stub::{StubBackend, StubProbe};

use crate::{
    config::ExecutionProvider,
    error::{Result, SnapEraseError},
    inference::InferenceBackend,
    models::ModelSpec,
};
use std::fmt;
use std::str::FromStr;

/// Backend type enumeration for runtime selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl BackendType {
    /// Whether this backend was compiled in
    #[must_use]
    pub fn is_available(self) -> bool {
        match self {
            Self::Onnx => cfg!(feature = "onnx"),
            Self::Tract => cfg!(feature = "tract"),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl FromStr for BackendType {
    type Err = SnapEraseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(SnapEraseError::config_value_error(
                "backend",
                other,
                "onnx, tract",
            )),
        }
    }
}

/// Options a factory needs beyond the model itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendOptions {
    pub execution_provider: ExecutionProvider,
    /// Intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Inter-op threads (0 = auto)
    pub inter_threads: usize,
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend of the given type bound to `spec`
    ///
    /// # Errors
    /// - `InvalidConfig` when the backend type is not compiled in
    fn create_backend(
        &self,
        backend_type: BackendType,
        spec: ModelSpec,
        options: BackendOptions,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory for the backends enabled through cargo features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        spec: ModelSpec,
        options: BackendOptions,
    ) -> Result<Box<dyn InferenceBackend>> {
        create_backend(backend_type, spec, options)
    }

    fn available_backends(&self) -> Vec<BackendType> {
        [BackendType::Onnx, BackendType::Tract]
            .into_iter()
            .filter(|backend| backend.is_available())
            .collect()
    }
}

/// Create an uninitialized backend of the given type bound to `spec`
///
/// # Errors
/// - `InvalidConfig` when the backend type is not compiled in
#[allow(unused_variables)]
pub fn create_backend(
    backend_type: BackendType,
    spec: ModelSpec,
    options: BackendOptions,
) -> Result<Box<dyn InferenceBackend>> {
    match backend_type {
        #[cfg(feature = "onnx")]
        BackendType::Onnx => Ok(Box::new(OnnxBackend::new(
            spec,
            options.execution_provider,
            options.intra_threads,
            options.inter_threads,
        ))),
        #[cfg(feature = "tract")]
        BackendType::Tract => {
            if options.execution_provider != ExecutionProvider::Auto
                && options.execution_provider != ExecutionProvider::Cpu
            {
                log::warn!(
                    "Tract runs on the CPU only; ignoring execution provider '{}'",
                    options.execution_provider
                );
            }
            Ok(Box::new(TractBackend::new(spec)))
        },
        #[allow(unreachable_patterns)]
        other => Err(SnapEraseError::invalid_config(format!(
            "{other} backend is not compiled in; enable the '{other}' feature"
        ))),
    }
}
