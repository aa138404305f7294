//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::DetectionConfig;
use crate::error::{DetectionError, Result};

/// Convert CLI arguments to a unified `DetectionConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `DetectionConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<DetectionConfig> {
        let mut builder = DetectionConfig::builder()
            .results_dir(&cli.results_dir)
            .heatmap_alpha(cli.heatmap_alpha)
            .original_beta(1.0 - cli.heatmap_alpha)
            .retention_hours(cli.retention_hours)
            .max_result_files(cli.max_result_files);
        if let Some(checkpoint) = &cli.checkpoint {
            builder = builder.checkpoint_path(checkpoint);
        }
        builder.build()
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if !(0.0..=1.0).contains(&cli.heatmap_alpha) {
            return Err(DetectionError::invalid_config(
                "heatmap alpha must be within [0, 1]",
            ));
        }
        if let Some(checkpoint) = &cli.checkpoint {
            if !checkpoint.exists() {
                return Err(DetectionError::invalid_config(format!(
                    "checkpoint file does not exist: {}",
                    checkpoint.display()
                )));
            }
        }
        Ok(())
    }
}
