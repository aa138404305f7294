//! Differentiable deepfake classifier and its Grad-CAM explanation engine

mod checkpoint;
mod detector;
mod gradcam;

pub use checkpoint::{load_checkpoint, read_checkpoint, save_checkpoint};
pub use detector::{tensor_from_array, CaptureContext, DeepfakeDetector, DECISION_THRESHOLD};
pub use gradcam::{normalize_importance_map, GradCam, NORMALIZATION_EPSILON};

use crate::{config::DetectionConfig, error::Result};
use burn::module::Module;
use burn::tensor::backend::Backend;
use ndarray::Array4;
use tracing::{info, warn};

/// CPU tensor backend used for plain inference
pub type NdBackend = burn::backend::NdArray<f32>;

/// Autodiff wrapper over [`NdBackend`] used for explanation passes
pub type AdBackend = burn::backend::Autodiff<NdBackend>;

/// Device type shared by both backends
pub type InferenceDevice = <NdBackend as Backend>::Device;

/// Process-wide inference state: model weights and device placement
///
/// Constructed once at startup and passed explicitly (by reference) to every
/// request handler. Written once, read-only thereafter; parameters are
/// wrapped `no_grad` so inference never records parameter gradients.
pub struct InferenceContext {
    model: DeepfakeDetector<AdBackend>,
    device: InferenceDevice,
}

impl InferenceContext {
    /// Initialize the model, loading checkpoint weights when configured
    ///
    /// Checkpoint failures are logged and recovered from by keeping the
    /// baseline weights; startup never fails because of a bad checkpoint.
    #[must_use]
    pub fn initialize(config: &DetectionConfig) -> Self {
        let device = InferenceDevice::default();
        let model = DeepfakeDetector::<AdBackend>::new(&device);

        let model = match &config.checkpoint_path {
            Some(path) => match load_checkpoint(path, model.clone(), &device) {
                Ok(loaded) => {
                    info!(checkpoint = %path.display(), "loaded trained weights");
                    loaded
                },
                Err(e) => {
                    warn!(checkpoint = %path.display(), error = %e, "could not load checkpoint, using baseline weights");
                    model
                },
            },
            None => {
                info!("no checkpoint configured, using baseline weights");
                model
            },
        };

        Self {
            model: model.no_grad(),
            device,
        }
    }

    /// The loaded classifier
    #[must_use]
    pub fn model(&self) -> &DeepfakeDetector<AdBackend> {
        &self.model
    }

    /// The device tensors are placed on
    #[must_use]
    pub fn device(&self) -> &InferenceDevice {
        &self.device
    }

    /// Plain-forward inference: sigmoid probability and thresholded decision
    ///
    /// Runs on the inner (non-autodiff) backend; no computation graph is
    /// recorded.
    pub fn predict(&self, input: &Array4<f32>) -> Result<(bool, f32)> {
        use burn::module::AutodiffModule;
        let tensor = tensor_from_array::<NdBackend>(input, &self.device)?;
        let probability = self.model.valid().probability(tensor);
        Ok((probability > DECISION_THRESHOLD, probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_input(side: usize) -> Array4<f32> {
        Array4::from_elem((1, 3, side, side), 0.25)
    }

    #[test]
    fn test_initialize_without_checkpoint() {
        let config = DetectionConfig::default();
        let ctx = InferenceContext::initialize(&config);
        let (_, probability) = ctx.predict(&uniform_input(64)).unwrap();
        assert!((0.0..=1.0).contains(&probability));
    }

    #[test]
    fn test_initialize_with_missing_checkpoint_falls_back() {
        let config = DetectionConfig::builder()
            .checkpoint_path("/nonexistent/weights.safetensors")
            .build()
            .unwrap();
        let ctx = InferenceContext::initialize(&config);
        assert!(ctx.predict(&uniform_input(64)).is_ok());
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let config = DetectionConfig::default();
        let ctx = InferenceContext::initialize(&config);
        let input = uniform_input(64);
        let (decision_a, prob_a) = ctx.predict(&input).unwrap();
        let (decision_b, prob_b) = ctx.predict(&input).unwrap();
        assert_eq!(decision_a, decision_b);
        assert!((prob_a - prob_b).abs() < 1e-6);
    }
}
