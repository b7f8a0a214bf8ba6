//! Configuration types for background removal operations

use crate::error::{Result, SnapEraseError};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest square input side accepted for a model
const MAX_INPUT_SIZE: u32 = 4096;

/// `ImageNet` statistics used by the U2-Net family
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Interpolation kernel shared by the input resize and the mask resample
///
/// Both directions must use the same kernel so that a mask lines up with the
/// pixels it was predicted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Linear filter over a 2x2 neighbourhood
    #[default]
    Bilinear,
    /// Cubic filter, sharper mask edges
    CatmullRom,
    /// Lanczos with window 3
    Lanczos3,
}

impl Interpolation {
    /// Map to the `image` crate filter implementing this kernel
    #[must_use]
    pub fn filter_type(self) -> FilterType {
        match self {
            Self::Bilinear => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Input contract of a segmentation model
///
/// The normalization constants belong to the model that was trained with them,
/// so they travel with the model instead of living in the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Human readable model name, used for logging and result metadata
    pub name: String,
    /// Side of the square input tensor (S in `[1, 3, S, S]`)
    pub input_size: u32,
    /// Per-channel mean subtracted after scaling to `[0, 1]`
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided out after mean subtraction
    pub normalization_std: [f32; 3],
    /// Resampling kernel for both resize directions
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::u2net()
    }
}

impl ModelConfig {
    /// U2-Net general purpose model (176 MB, 320x320)
    #[must_use]
    pub fn u2net() -> Self {
        Self {
            name: "u2net".to_string(),
            input_size: 320,
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
            interpolation: Interpolation::Bilinear,
        }
    }

    /// Lightweight U2-Net variant
    #[must_use]
    pub fn u2netp() -> Self {
        Self {
            name: "u2netp".to_string(),
            ..Self::u2net()
        }
    }

    /// Silueta, a pruned U2-Net
    #[must_use]
    pub fn silueta() -> Self {
        Self {
            name: "silueta".to_string(),
            ..Self::u2net()
        }
    }

    /// IS-Net general use model (1024x1024, centred but unscaled inputs)
    #[must_use]
    pub fn isnet() -> Self {
        Self {
            name: "isnet".to_string(),
            input_size: 1024,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
            interpolation: Interpolation::Bilinear,
        }
    }

    /// Look up a preset by name
    ///
    /// # Errors
    /// - Unknown preset name
    pub fn from_preset_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "u2net" => Ok(Self::u2net()),
            "u2netp" => Ok(Self::u2netp()),
            "silueta" => Ok(Self::silueta()),
            "isnet" | "isnet-general-use" => Ok(Self::isnet()),
            other => Err(SnapEraseError::invalid_config(format!(
                "Unknown model preset '{other}'. Available: u2net, u2netp, silueta, isnet"
            ))),
        }
    }

    /// Load a model configuration from a `model.json` file
    ///
    /// # Errors
    /// - File cannot be read
    /// - JSON does not describe a valid configuration
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SnapEraseError::invalid_config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SnapEraseError::invalid_config(format!("Failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Change the interpolation kernel
    #[must_use]
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Expected input tensor shape (NCHW)
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        let side = self.input_size as usize;
        (1, 3, side, side)
    }

    /// Expected output tensor shape (NCHW)
    #[must_use]
    pub fn output_shape(&self) -> (usize, usize, usize, usize) {
        let side = self.input_size as usize;
        (1, 1, side, side)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Input size is zero or larger than 4096
    /// - Any mean is not finite
    /// - Any standard deviation is not finite and strictly positive
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.input_size > MAX_INPUT_SIZE {
            return Err(SnapEraseError::config_value_error(
                "input size",
                self.input_size,
                "1-4096",
            ));
        }

        if let Some(mean) = self.normalization_mean.iter().find(|m| !m.is_finite()) {
            return Err(SnapEraseError::config_value_error(
                "normalization mean",
                mean,
                "finite values",
            ));
        }

        if let Some(std) = self
            .normalization_std
            .iter()
            .find(|s| !s.is_finite() || **s <= 0.0)
        {
            return Err(SnapEraseError::config_value_error(
                "normalization std",
                std,
                "finite values > 0",
            ));
        }

        Ok(())
    }
}
