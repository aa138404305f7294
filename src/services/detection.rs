//! End-to-end analysis orchestration
//!
//! One service call takes raw upload bytes through validation, decoding,
//! preprocessing, classification, Grad-CAM explanation, artifact
//! persistence and session registration. Nothing is written to disk until
//! the prediction and explanation both succeed, so failed requests leave
//! no artifacts behind.

use crate::{
    config::DetectionConfig,
    error::{DetectionError, Result},
    heatmap,
    model::{GradCam, InferenceContext},
    preprocess,
    services::storage,
    session::SessionCache,
    types::{DetectionResponse, Explanation, Prediction, TargetClass},
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Analysis pipeline over a shared model, config and session cache
pub struct DetectionService {
    context: Arc<InferenceContext>,
    config: Arc<DetectionConfig>,
    sessions: Arc<SessionCache>,
    gradcam: GradCam,
}

impl DetectionService {
    /// Assemble the pipeline from shared state
    #[must_use]
    pub fn new(
        context: Arc<InferenceContext>,
        config: Arc<DetectionConfig>,
        sessions: Arc<SessionCache>,
    ) -> Self {
        let gradcam = GradCam::new(context.model().clone());
        Self {
            context,
            config,
            sessions,
            gradcam,
        }
    }

    /// The session cache backing this service
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &Arc<DetectionConfig> {
        &self.config
    }

    /// Analyze an uploaded image
    ///
    /// The explanation always targets the class the model decided on, so
    /// the overlay shows evidence for the reported label. Artifacts are
    /// persisted under timestamped unique names and the analysis is
    /// registered as a session for later report export.
    ///
    /// # Errors
    ///
    /// Input errors for rejected uploads; `Model`, `Explanation` or
    /// `Storage` errors for pipeline failures.
    #[instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub fn analyze(&self, payload: &[u8], content_type: &str) -> Result<DetectionResponse> {
        let started = instant::Instant::now();
        preprocess::validate_upload(content_type, payload.len(), &self.config)?;
        let image = preprocess::decode_image(payload)?;
        preprocess::validate_dimensions(&image)?;

        let tensor = preprocess::preprocess(&image, &self.config);
        let (is_deepfake, probability) = self.context.predict(&tensor)?;
        let prediction = Prediction::from_decision(is_deepfake);

        let target = TargetClass::from_decision(is_deepfake);
        let map = self
            .gradcam
            .generate(&tensor, Some(target), self.context.device())?;
        let rendered = heatmap::composite(
            &image,
            &map,
            self.config.heatmap_alpha,
            self.config.original_beta,
        )?;

        let (source_path, overlay_path, overlay_url) = self.persist(&image, &rendered)?;

        let response = DetectionResponse {
            success: true,
            prediction: prediction.clone(),
            explanation: Explanation {
                gradcam_image: overlay_url,
                description: Explanation::describe(&prediction.label),
            },
            session_id: None,
        };

        let session_id = self
            .sessions
            .insert(source_path, overlay_path, response.clone());

        info!(
            label = %prediction.label,
            probability,
            session = %session_id,
            duration_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );

        Ok(DetectionResponse {
            session_id: Some(session_id),
            ..response
        })
    }

    /// Persist the source image and overlay, then enforce the count cap
    ///
    /// Returns the two paths and the overlay's public URL path. Either
    /// write failing surfaces as a `Storage` error; cleanup failures are
    /// deferred to the periodic sweep.
    fn persist(
        &self,
        image: &image::DynamicImage,
        rendered: &heatmap::RenderedHeatmap,
    ) -> Result<(PathBuf, PathBuf, String)> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let tag = Uuid::new_v4().simple().to_string();
        let short = tag.get(..8).ok_or_else(|| {
            DetectionError::internal("generated identifier shorter than expected")
        })?;

        let overlay_name = format!("gradcam_{stamp}_{short}.png");
        let source_name = format!("source_{stamp}_{short}.png");

        let overlay_path = self.config.results_dir.join(&overlay_name);
        let source_path = self.config.results_dir.join(&source_name);

        storage::save_png(&image.to_rgb8(), &source_path)?;
        storage::save_png(&rendered.overlay, &overlay_path)?;

        // Keep the cap enforced between periodic sweeps.
        let _ = storage::cleanup_by_count(&self.config.results_dir, self.config.max_result_files);

        Ok((source_path, overlay_path, format!("/results/{overlay_name}")))
    }
}
