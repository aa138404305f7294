//! Deepfake detection CLI tool
//!
//! Analyzes images from the command line with the same pipeline the
//! library exposes, printing the detection response as JSON and
//! optionally exporting a PDF report.

use super::config::CliConfigBuilder;
use crate::{
    error::{DetectionError, Result},
    model::InferenceContext,
    services::{self, DetectionService},
    session::SessionCache,
    tracing_config::init_cli_tracing,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Deepfake detection CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "authlens")]
pub struct Cli {
    /// Input image files to analyze
    #[arg(value_name = "INPUT", required_unless_present_any = &["cleanup", "stats"])]
    pub input: Vec<String>,

    /// Write a PDF report for the (single) analyzed image to this path
    #[arg(short, long, value_name = "REPORT")]
    pub report: Option<PathBuf>,

    /// Directory where overlay and source artifacts are persisted
    #[arg(long, default_value = "results", value_name = "DIR")]
    pub results_dir: PathBuf,

    /// Trained weights to load (safetensors); baseline weights when omitted
    #[arg(short, long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    /// Heatmap opacity in the overlay blend
    #[arg(long, default_value_t = 0.4)]
    pub heatmap_alpha: f32,

    /// Age-based retention window for persisted artifacts, in hours
    #[arg(long, default_value_t = 24)]
    pub retention_hours: u64,

    /// Count cap on persisted artifacts
    #[arg(long, default_value_t = 1000)]
    pub max_result_files: usize,

    /// Run a retention sweep over the results directory and exit
    #[arg(long)]
    pub cleanup: bool,

    /// Show results directory statistics and exit
    #[arg(long)]
    pub stats: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose)?;

    CliConfigBuilder::validate_cli(&cli)?;
    let config = Arc::new(CliConfigBuilder::from_cli(&cli)?);

    if cli.cleanup {
        let by_age = services::cleanup_by_age(&config.results_dir, config.retention_hours)?;
        let by_count = services::cleanup_by_count(&config.results_dir, config.max_result_files)?;
        info!(by_age, by_count, "retention sweep complete");
        return Ok(());
    }

    if cli.stats {
        let stats = services::storage_stats(&config.results_dir)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&stats)
                .map_err(|e| DetectionError::internal(format!("could not encode stats: {e}")))?
        );
        return Ok(());
    }

    if cli.report.is_some() && cli.input.len() != 1 {
        return Err(DetectionError::invalid_config(
            "report export requires exactly one input image",
        ));
    }

    let context = Arc::new(InferenceContext::initialize(&config));
    let sessions = Arc::new(SessionCache::new(
        config.session_ttl_minutes as i64,
        config.session_capacity,
    ));
    let service = DetectionService::new(context, Arc::clone(&config), Arc::clone(&sessions));

    let mut failures = 0usize;
    for input in &cli.input {
        let path = Path::new(input);
        match analyze_file(&service, path) {
            Ok(session_id) => {
                if let Some(report_path) = &cli.report {
                    let pdf = services::generate_report(&sessions, &session_id)?;
                    std::fs::write(report_path, pdf)
                        .map_err(|e| DetectionError::file_io_error(report_path, &e))?;
                    info!(report = %report_path.display(), "report written");
                }
            },
            Err(e) => {
                warn!(input = %path.display(), error = %e, "analysis failed");
                failures += 1;
            },
        }
    }

    if failures > 0 {
        return Err(DetectionError::internal(format!(
            "{failures} of {} input(s) failed",
            cli.input.len()
        )));
    }
    Ok(())
}

/// Analyze one file and print its response as JSON
fn analyze_file(service: &DetectionService, path: &Path) -> Result<String> {
    let payload = std::fs::read(path).map_err(|e| DetectionError::file_io_error(path, &e))?;
    let content_type = content_type_for(path);

    let response = service.analyze(&payload, content_type)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&response)
            .map_err(|e| DetectionError::internal(format!("could not encode response: {e}")))?
    );

    response
        .session_id
        .ok_or_else(|| DetectionError::internal("analysis completed without a session id"))
}

/// Declared content type from the file extension
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
