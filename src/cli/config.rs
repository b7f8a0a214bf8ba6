//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::ModelConfig,
    models::ModelSpec,
    processor::{ProcessorConfig, ProcessorConfigBuilder},
    services::{io::SUPPORTED_EXTENSIONS, ImageIo},
};
use anyhow::{Context, Result};

/// Convert CLI arguments to `ProcessorConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `ProcessorConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ProcessorConfig> {
        let model_path = cli
            .model
            .clone()
            .context("A model path is required (--model PATH)")?;

        let mut model_spec = match cli.preset {
            Some(preset) => ModelSpec::new(model_path, ModelConfig::from(preset)),
            None => ModelSpec::from_path(model_path).context("Invalid model configuration")?,
        };
        if let Some(interpolation) = cli.interpolation {
            model_spec.config = model_spec.config.with_interpolation(interpolation.into());
        }

        let config = ProcessorConfigBuilder::new()
            .model_spec(model_spec)
            .backend_type(cli.backend.into())
            .execution_provider(cli.provider.into())
            .debug(cli.verbose >= 2)
            // Same thread count for intra and inter operations
            .intra_threads(cli.threads)
            .inter_threads(cli.threads)
            .build()
            .context("Invalid configuration")?;

        Ok(config)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        let input = cli.input.as_ref().context("An input image is required")?;
        if !ImageIo::is_supported_image(input) {
            anyhow::bail!(
                "Unsupported input '{}': expected one of {}",
                input.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            );
        }
        if cli.model.is_none() {
            anyhow::bail!("A model path is required (--model PATH)");
        }
        Ok(())
    }
}
