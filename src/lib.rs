#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # AuthLens Deepfake Detection Library
//!
//! A Rust library for detecting AI-generated images with visual Grad-CAM
//! explanations. Every analysis returns both a verdict and a heatmap overlay
//! showing which regions of the image drove the decision.
//!
//! The classifier is a compact convolutional network running on the pure-Rust
//! `burn` tensor stack, so inference and gradient-based explanations work
//! without any native runtime dependencies.
//!
//! ## Features
//!
//! - **Detection**: binary real vs AI-generated classification with a
//!   sigmoid-thresholded decision
//! - **Explanations**: Grad-CAM importance maps rendered as jet-colored
//!   overlays at the original image resolution
//! - **Checkpoints**: safetensors weight loading with graceful fallback to
//!   baseline weights
//! - **Artifact management**: persisted overlays with age- and count-based
//!   retention sweeps
//! - **Sessions and reports**: cached analyses exportable as PDF reports
//! - **CLI Integration**: optional command-line interface (enable with the
//!   `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authlens::{analyze_image_from_bytes, DetectionConfig};
//!
//! # async fn example(upload_bytes: Vec<u8>) -> authlens::Result<()> {
//! let config = DetectionConfig::builder()
//!     .results_dir("/tmp/authlens-results")
//!     .build()?;
//! let response = analyze_image_from_bytes(&upload_bytes, "image/png", &config).await?;
//! println!("{} -> {}", response.prediction.label, response.explanation.gradcam_image);
//! # Ok(())
//! # }
//! ```
//!
//! For servers handling many requests, build a [`DetectionService`] once and
//! share it; the convenience functions construct a fresh model per call.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod heatmap;
pub mod model;
pub mod preprocess;
pub mod services;
pub mod session;
pub mod tracing_config;
pub mod types;

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

// Public API exports
pub use config::{
    DetectionConfig, DetectionConfigBuilder, DEFAULT_IMAGE_SIZE, MAX_IMAGE_DIMENSION,
    MIN_IMAGE_DIMENSION, NORMALIZATION_MEAN, NORMALIZATION_STD,
};
pub use error::{DetectionError, Result};
pub use heatmap::{composite, jet_color, RenderedHeatmap};
pub use model::{
    load_checkpoint, normalize_importance_map, save_checkpoint, AdBackend, DeepfakeDetector,
    GradCam, InferenceContext, InferenceDevice, NdBackend, DECISION_THRESHOLD,
    NORMALIZATION_EPSILON,
};
pub use services::{generate_report, storage_stats, DetectionService, StorageStats};
pub use session::{SessionCache, SessionEntry, SessionStats};
pub use types::{
    DetectionResponse, Explanation, Prediction, TargetClass, LABEL_DEEPFAKE, LABEL_REAL,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, init_library_tracing};
pub use tracing_config::{TracingConfig, TracingFormat};

/// Analyze an image provided as bytes
///
/// Stream-based API suitable for web servers and memory-based processing.
/// Builds a fresh model per call; for repeated analyses construct a
/// [`DetectionService`] once instead.
///
/// # Arguments
///
/// * `image_bytes` - Raw image data (JPEG, PNG, WebP)
/// * `content_type` - Declared content type of the upload
/// * `config` - Configuration for the analysis
pub async fn analyze_image_from_bytes(
    image_bytes: &[u8],
    content_type: &str,
    config: &DetectionConfig,
) -> Result<DetectionResponse> {
    let config = Arc::new(config.clone());
    let context = Arc::new(InferenceContext::initialize(&config));
    let sessions = Arc::new(SessionCache::new(
        config.session_ttl_minutes as i64,
        config.session_capacity,
    ));
    DetectionService::new(context, config, sessions).analyze(image_bytes, content_type)
}

/// Analyze an already-decoded image
///
/// The image is re-encoded as PNG and run through the full validation
/// pipeline, so dimension limits still apply.
pub async fn analyze_image(
    image: &image::DynamicImage,
    config: &DetectionConfig,
) -> Result<DetectionResponse> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| DetectionError::internal(format!("could not encode image: {e}")))?;
    analyze_image_from_bytes(&bytes, "image/png", config).await
}

/// Analyze an image read from an async source
///
/// Reads the whole source into memory first; the payload ceiling is
/// enforced after reading.
pub async fn analyze_image_from_reader(
    mut reader: impl AsyncRead + Unpin,
    content_type: &str,
    config: &DetectionConfig,
) -> Result<DetectionResponse> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    analyze_image_from_bytes(&bytes, content_type, config).await
}
