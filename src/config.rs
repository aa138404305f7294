//! Configuration for the detection pipeline
//!
//! One `DetectionConfig` value covers preprocessing, classification,
//! Grad-CAM rendering, result storage and session retention. It is built
//! once at startup and shared read-only by every request.

use crate::error::{DetectionError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default side length of the model input square
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Per-channel normalization mean (RGB order, standard image-corpus values)
pub const NORMALIZATION_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel normalization standard deviation (RGB order)
pub const NORMALIZATION_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Minimum accepted width/height of an input image, in pixels
pub const MIN_IMAGE_DIMENSION: u32 = 32;

/// Maximum accepted width/height of an input image, in pixels
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// Configuration for detection, explanation and result retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Model input side length; images are resized (aspect-distorting) to a square
    pub image_size: u32,
    /// Heatmap opacity in the overlay blend
    pub heatmap_alpha: f32,
    /// Original image opacity in the overlay blend
    pub original_beta: f32,
    /// Optional checkpoint to load at startup; baseline weights are used when
    /// absent or unloadable
    pub checkpoint_path: Option<PathBuf>,
    /// Flat directory where overlay and source images are persisted
    pub results_dir: PathBuf,
    /// Age-based retention: artifacts older than this many hours are purged
    pub retention_hours: u64,
    /// Count-based retention: cap on stored artifacts, oldest evicted first
    pub max_result_files: usize,
    /// Upload payload ceiling in bytes; checked before decoding
    pub max_payload_bytes: usize,
    /// Accepted upload content types
    pub allowed_content_types: Vec<String>,
    /// Sessions older than this many minutes are expired
    pub session_ttl_minutes: u64,
    /// Cap on cached sessions, oldest evicted first
    pub session_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            heatmap_alpha: 0.4,
            original_beta: 0.6,
            checkpoint_path: None,
            results_dir: PathBuf::from("results"),
            retention_hours: 24,
            max_result_files: 1000,
            max_payload_bytes: 10 * 1024 * 1024,
            allowed_content_types: vec![
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            session_ttl_minutes: 60,
            session_capacity: 1000,
        }
    }
}

impl DetectionConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> DetectionConfigBuilder {
        DetectionConfigBuilder::new()
    }

    /// Whether the declared upload content type is accepted
    #[must_use]
    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

/// Builder for [`DetectionConfig`]
pub struct DetectionConfigBuilder {
    config: DetectionConfig,
}

impl DetectionConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
        }
    }

    #[must_use]
    pub fn image_size(mut self, size: u32) -> Self {
        self.config.image_size = size;
        self
    }

    #[must_use]
    pub fn heatmap_alpha(mut self, alpha: f32) -> Self {
        self.config.heatmap_alpha = alpha;
        self
    }

    #[must_use]
    pub fn original_beta(mut self, beta: f32) -> Self {
        self.config.original_beta = beta;
        self
    }

    #[must_use]
    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    #[must_use]
    pub fn retention_hours(mut self, hours: u64) -> Self {
        self.config.retention_hours = hours;
        self
    }

    #[must_use]
    pub fn max_result_files(mut self, max: usize) -> Self {
        self.config.max_result_files = max;
        self
    }

    #[must_use]
    pub fn max_payload_bytes(mut self, max: usize) -> Self {
        self.config.max_payload_bytes = max;
        self
    }

    #[must_use]
    pub fn session_ttl_minutes(mut self, minutes: u64) -> Self {
        self.config.session_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn session_capacity(mut self, capacity: usize) -> Self {
        self.config.session_capacity = capacity;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::InvalidConfig` for:
    /// - Blend weights outside [0, 1]
    /// - Image size outside [32, 1024]
    /// - Zero retention window or payload ceiling
    pub fn build(self) -> Result<DetectionConfig> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.heatmap_alpha) {
            return Err(DetectionError::invalid_config(
                "heatmap alpha must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&c.original_beta) {
            return Err(DetectionError::invalid_config(
                "original beta must be within [0, 1]",
            ));
        }
        if !(MIN_IMAGE_DIMENSION..=1024).contains(&c.image_size) {
            return Err(DetectionError::invalid_config(
                "image size must be within [32, 1024]",
            ));
        }
        if c.retention_hours == 0 {
            return Err(DetectionError::invalid_config(
                "retention window must be at least one hour",
            ));
        }
        if c.max_payload_bytes == 0 {
            return Err(DetectionError::invalid_config(
                "payload ceiling must be non-zero",
            ));
        }
        Ok(self.config)
    }
}

impl Default for DetectionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectionConfig::default();
        assert_eq!(config.image_size, 224);
        assert!((config.heatmap_alpha - 0.4).abs() < f32::EPSILON);
        assert!((config.original_beta - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.max_result_files, 1000);
    }

    #[test]
    fn test_content_type_acceptance() {
        let config = DetectionConfig::default();
        assert!(config.accepts_content_type("image/jpeg"));
        assert!(config.accepts_content_type("IMAGE/PNG"));
        assert!(config.accepts_content_type("image/webp"));
        assert!(!config.accepts_content_type("text/plain"));
        assert!(!config.accepts_content_type("application/pdf"));
    }

    #[test]
    fn test_builder_validation() {
        assert!(DetectionConfig::builder().heatmap_alpha(1.5).build().is_err());
        assert!(DetectionConfig::builder().original_beta(-0.1).build().is_err());
        assert!(DetectionConfig::builder().image_size(16).build().is_err());
        assert!(DetectionConfig::builder().retention_hours(0).build().is_err());
        assert!(DetectionConfig::builder()
            .heatmap_alpha(1.0)
            .original_beta(0.0)
            .build()
            .is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = DetectionConfig::builder()
            .image_size(64)
            .results_dir("/tmp/authlens-results")
            .max_result_files(10)
            .session_ttl_minutes(5)
            .build()
            .unwrap();
        assert_eq!(config.image_size, 64);
        assert_eq!(config.results_dir, PathBuf::from("/tmp/authlens-results"));
        assert_eq!(config.max_result_files, 10);
        assert_eq!(config.session_ttl_minutes, 5);
    }
}
