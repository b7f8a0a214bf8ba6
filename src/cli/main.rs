//! Snap Erase CLI Tool
//!
//! Loads one photograph, removes its background and writes a transparent PNG.

use super::config::CliConfigBuilder;
use crate::{
    backends::BackendType,
    config::{ExecutionProvider, Interpolation, ModelConfig},
    processor::{BackgroundRemovalProcessor, ProcessorConfig},
    services::ImageIo,
    tracing_config::{init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

/// Remove the background of a photograph
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "snap-erase")]
pub struct Cli {
    /// Input photograph (.jpg, .jpeg, .png or .bmp)
    #[arg(value_name = "INPUT", required_unless_present = "show_providers")]
    pub input: Option<PathBuf>,

    /// Output PNG file [default: <INPUT stem>_no_bg.png next to the input]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Path to the .onnx model file
    #[arg(short, long, value_name = "PATH", required_unless_present = "show_providers")]
    pub model: Option<PathBuf>,

    /// Model preset [default: model.json next to the model, else guessed from its file name]
    #[arg(long, value_enum)]
    pub preset: Option<CliPreset>,

    /// Inference backend
    #[arg(short, long, value_enum, default_value_t = CliBackend::Onnx)]
    pub backend: CliBackend,

    /// Execution provider for the ONNX backend
    #[arg(short, long, value_enum, default_value_t = CliProvider::Auto)]
    pub provider: CliProvider,

    /// Resampling kernel for the input resize and mask upscale [default: model setting]
    #[arg(long, value_enum)]
    pub interpolation: Option<CliInterpolation>,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Also write the alpha mask next to the output as <OUTPUT stem>_mask.png
    #[arg(long)]
    pub save_mask: bool,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliPreset {
    U2net,
    U2netp,
    Isnet,
    Silueta,
}

impl From<CliPreset> for ModelConfig {
    fn from(preset: CliPreset) -> Self {
        match preset {
            CliPreset::U2net => Self::u2net(),
            CliPreset::U2netp => Self::u2netp(),
            CliPreset::Isnet => Self::isnet(),
            CliPreset::Silueta => Self::silueta(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    Onnx,
    Tract,
}

impl From<CliBackend> for BackendType {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Onnx => Self::Onnx,
            CliBackend::Tract => Self::Tract,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliProvider {
    Auto,
    Cpu,
    Cuda,
    Coreml,
}

impl From<CliProvider> for ExecutionProvider {
    fn from(provider: CliProvider) -> Self {
        match provider {
            CliProvider::Auto => Self::Auto,
            CliProvider::Cpu => Self::Cpu,
            CliProvider::Cuda => Self::Cuda,
            CliProvider::Coreml => Self::CoreMl,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliInterpolation {
    Bilinear,
    CatmullRom,
    Lanczos3,
}

impl From<CliInterpolation> for Interpolation {
    fn from(interpolation: CliInterpolation) -> Self {
        match interpolation {
            CliInterpolation::Bilinear => Self::Bilinear,
            CliInterpolation::CatmullRom => Self::CatmullRom,
            CliInterpolation::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Entry point of the `snap-erase` binary
///
/// # Errors
/// - Invalid arguments, unsupported input, model or processing failures
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let input = cli
        .input
        .clone()
        .context("An input image is required")?;

    let session = spans::session(
        &session_id,
        &config.model_spec.display_name(),
        &config.backend_type.to_string(),
    );
    run(&cli, config, &input).instrument(session).await
}

async fn run(cli: &Cli, config: ProcessorConfig, input: &Path) -> Result<()> {
    info!(
        "Backend: {}, Provider: {}, Model: {}",
        config.backend_type,
        config.execution_provider,
        config.model_spec.display_name()
    );

    let processor =
        Arc::new(BackgroundRemovalProcessor::new(config).context("Failed to create processor")?);
    processor
        .initialize()
        .context("Failed to load the segmentation model")?;

    let image = ImageIo::load(input)
        .with_context(|| format!("Failed to load image {}", input.display()))?;
    info!(
        "Loaded {} ({}x{})",
        input.display(),
        image.width(),
        image.height()
    );

    let result = processor
        .remove_background_async(image)
        .instrument(spans::file_processing(input))
        .await
        .context("Failed to remove background")?;
    info!("📊 {}", result.metadata().timings.summary());

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| ImageIo::default_output_path(input));
    ImageIo::save_result(&result, &output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("✅ Saved {}", output.display());

    if cli.save_mask {
        let mask_path = ImageIo::default_mask_path(&output);
        ImageIo::save_alpha_mask(&result, &mask_path)
            .with_context(|| format!("Failed to save mask {}", mask_path.display()))?;
        println!("✅ Saved mask {}", mask_path.display());
    }

    Ok(())
}

fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    #[cfg(feature = "onnx")]
    {
        println!("\n🚀 onnx:");
        for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
            let status = if available { "✅ Available" } else { "❌ Not Available" };
            println!("  • {name}: {status} - {description}");
        }
    }

    #[cfg(feature = "tract")]
    {
        println!("\n🦀 tract:");
        for (name, available, description) in crate::backends::TractBackend::list_providers() {
            let status = if available { "✅ Available" } else { "❌ Not Available" };
            println!("  • {name}: {status} - {description}");
        }
    }

    if !BackendType::Onnx.is_available() && !BackendType::Tract.is_available() {
        warn!("No inference backend compiled in; enable the 'onnx' or 'tract' feature");
    }
}
