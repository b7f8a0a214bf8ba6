//! Model artifact resolution
//!
//! A model is an `.onnx` file plus the [`ModelConfig`] describing its input
//! contract. The configuration comes from, in order: a `model.json` next to the
//! artifact, a preset matching the file stem, or the U2-Net defaults.

use crate::{
    config::ModelConfig,
    error::{Result, SnapEraseError},
};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional configuration sidecar
pub const MODEL_SIDECAR: &str = "model.json";

/// Complete model specification: artifact path and input contract
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSpec {
    pub path: PathBuf,
    pub config: ModelConfig,
}

impl ModelSpec {
    /// Pair an artifact with an explicit configuration
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P, config: ModelConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Build a spec for an artifact, discovering its configuration
    ///
    /// # Errors
    /// - A `model.json` sidecar exists but is invalid
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        let sidecar = path
            .parent()
            .map_or_else(|| PathBuf::from(MODEL_SIDECAR), |dir| dir.join(MODEL_SIDECAR));
        if sidecar.is_file() {
            log::debug!("Using model configuration from {}", sidecar.display());
            let config = ModelConfig::from_json_file(&sidecar)?;
            return Ok(Self::new(path, config));
        }

        let config = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| ModelConfig::from_preset_name(stem).ok())
            .unwrap_or_default();
        log::debug!(
            "Using preset '{}' for model {}",
            config.name,
            path.display()
        );
        Ok(Self::new(path, config))
    }

    /// Display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{}:{}",
            self.config.name,
            self.path.file_name().unwrap_or_default().to_string_lossy()
        )
    }

    /// Check that the artifact exists and is a regular file
    ///
    /// # Errors
    /// - `ModelUnavailable` when the path is missing or not a file
    pub fn resolve(&self) -> Result<&Path> {
        if !self.path.exists() {
            return Err(SnapEraseError::model_error_with_context(
                "locate",
                &self.path,
                "file not found",
                &["check the --model path", "download the model artifact"],
            ));
        }
        if !self.path.is_file() {
            return Err(SnapEraseError::model_error_with_context(
                "locate",
                &self.path,
                "path is not a file",
                &["point at the .onnx file itself"],
            ));
        }
        Ok(&self.path)
    }

    /// Read the artifact into memory
    ///
    /// # Errors
    /// - `ModelUnavailable` when the artifact is missing, unreadable or empty
    pub fn load_bytes(&self) -> Result<Vec<u8>> {
        let path = self.resolve()?;
        let bytes = fs::read(path).map_err(|e| {
            SnapEraseError::model_error_with_context("read", path, &e.to_string(), &[])
        })?;
        if bytes.is_empty() {
            return Err(SnapEraseError::model_error_with_context(
                "read",
                path,
                "file is empty",
                &[],
            ));
        }
        log::debug!(
            "Loaded model {} ({} bytes)",
            path.display(),
            bytes.len()
        );
        Ok(bytes)
    }
}
