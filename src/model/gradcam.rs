//! Grad-CAM explanation engine
//!
//! Generates class-activation importance maps by differentiating a targeted
//! scalar with respect to the last convolutional feature map, weighting the
//! activation channels by the spatially averaged gradients, and normalizing
//! the rectified sum into [0, 1].
//!
//! Reference:
//!     "Grad-CAM: Visual Explanations from Deep Networks via
//!      Gradient-based Localization", <https://arxiv.org/abs/1610.02391>

use crate::{
    error::{DetectionError, Result},
    model::{
        detector::{tensor_from_array, DeepfakeDetector, DECISION_THRESHOLD},
        AdBackend, InferenceDevice,
    },
    types::TargetClass,
};
use burn::tensor::{activation::sigmoid, ElementConversion};
use ndarray::{Array2, Array4};
use tracing::warn;

/// Epsilon added to the normalization denominator
///
/// Combined with the explicit flat-map check in
/// [`normalize_importance_map`] this is slightly redundant; both are kept
/// so a degenerate map can never come out near-zero-but-nonzero.
pub const NORMALIZATION_EPSILON: f32 = 1e-8;

/// Grad-CAM generator over a [`DeepfakeDetector`]
///
/// Holds its own handle to the model; burn modules share parameter storage
/// on clone, so this adds no weight copies. Each `generate` call builds a
/// private capture context, making the generator safe to share across
/// concurrent requests.
pub struct GradCam {
    model: DeepfakeDetector<AdBackend>,
}

impl GradCam {
    /// Create a generator for a model
    #[must_use]
    pub fn new(model: DeepfakeDetector<AdBackend>) -> Self {
        Self { model }
    }

    /// Generate an importance map for an input tensor
    ///
    /// When `target` is `None` the class is picked by thresholding the
    /// captured logit. For the deepfake class the raw logit is
    /// differentiated; for the real class its negation is, which is how a
    /// single-output binary head supports two-class explanations.
    ///
    /// The returned map has values in [0, 1]. If the activation gradient
    /// is unavailable after the backward pass, an all-zero map sized to
    /// the input's spatial dimensions is returned and a warning is logged;
    /// this path never raises.
    pub fn generate(
        &self,
        input: &Array4<f32>,
        target: Option<TargetClass>,
        device: &InferenceDevice,
    ) -> Result<Array2<f32>> {
        let (_, _, input_h, input_w) = input.dim();
        let x = tensor_from_array::<AdBackend>(input, device)?;

        let ctx = self.model.forward_with_capture(x);

        let target = match target {
            Some(t) => t,
            None => {
                let probability: f32 = sigmoid(ctx.logit.clone()).into_scalar().elem();
                TargetClass::from_decision(probability > DECISION_THRESHOLD)
            },
        };

        // Sign flip for class 0: maximizing real-ness is minimizing the logit.
        let scalar = match target {
            TargetClass::Deepfake => ctx.logit.clone(),
            TargetClass::Real => ctx.logit.clone().neg(),
        };

        let grads = scalar.reshape([1]).backward();
        let Some(gradient) = ctx.activation.grad(&grads) else {
            warn!("activation gradient unavailable after backward pass, returning empty map");
            return Ok(Array2::zeros((input_h, input_w)));
        };
        let activation = ctx.activation.inner();

        // Per-channel weights: spatial mean of the gradient.
        let weights = gradient.mean_dim(3).mean_dim(2);
        // Weighted channel sum, rectified to positive contributions only.
        let cam = (activation * weights).sum_dim(1).clamp_min(0.0);

        let [_, _, h, w] = cam.dims();
        let raw = cam
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| DetectionError::explanation(format!("could not read CAM data: {e:?}")))?;

        let normalized = normalize_importance_map(&raw);
        Array2::from_shape_vec((h, w), normalized)
            .map_err(|e| DetectionError::explanation(format!("CAM shape mismatch: {e}")))
    }
}

/// Min-max normalize a raw importance map into [0, 1]
///
/// A flat map (max equals min) yields all zeros rather than relying on the
/// epsilon alone.
#[must_use]
pub fn normalize_importance_map(raw: &[f32]) -> Vec<f32> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in raw {
        min = min.min(v);
        max = max.max(v);
    }
    if raw.is_empty() || max <= min {
        return vec![0.0; raw.len()];
    }
    let range = max - min + NORMALIZATION_EPSILON;
    raw.iter().map(|&v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InferenceContext;
    use crate::config::DetectionConfig;

    fn test_input(side: usize, value: f32) -> Array4<f32> {
        Array4::from_elem((1, 3, side, side), value)
    }

    fn generator() -> (GradCam, InferenceDevice) {
        let ctx = InferenceContext::initialize(&DetectionConfig::default());
        let device = *ctx.device();
        (GradCam::new(ctx.model().clone()), device)
    }

    #[test]
    fn test_map_values_within_unit_interval() {
        let (gradcam, device) = generator();
        let map = gradcam.generate(&test_input(64, 0.4), None, &device).unwrap();
        assert_eq!(map.dim(), (2, 2));
        for &v in map.iter() {
            assert!(v.is_finite());
            assert!((0.0..=1.0).contains(&v), "value {v} out of range");
        }
    }

    #[test]
    fn test_explicit_targets_produce_maps() {
        let (gradcam, device) = generator();
        let input = test_input(64, 0.4);
        for target in [TargetClass::Real, TargetClass::Deepfake] {
            let map = gradcam.generate(&input, Some(target), &device).unwrap();
            assert_eq!(map.dim(), (2, 2));
            for &v in map.iter() {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_target_negation_inverts_gradients() {
        let ctx = InferenceContext::initialize(&DetectionConfig::default());
        let device = *ctx.device();
        let input = test_input(64, 0.4);

        let capture = ctx
            .model()
            .forward_with_capture(tensor_from_array(&input, &device).unwrap());
        let grads = capture.logit.clone().reshape([1]).backward();
        let fake_grad = capture.activation.grad(&grads).unwrap();

        let capture = ctx
            .model()
            .forward_with_capture(tensor_from_array(&input, &device).unwrap());
        let grads = capture.logit.clone().neg().reshape([1]).backward();
        let real_grad = capture.activation.grad(&grads).unwrap();

        let fake: Vec<f32> = fake_grad.into_data().to_vec().unwrap();
        let real: Vec<f32> = real_grad.into_data().to_vec().unwrap();
        assert_eq!(fake.len(), real.len());
        for (a, b) in fake.iter().zip(real.iter()) {
            assert!((a + b).abs() < 1e-6, "expected sign inversion, got {a} and {b}");
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let (gradcam, device) = generator();
        let input = test_input(64, 0.7);
        let a = gradcam.generate(&input, Some(TargetClass::Deepfake), &device).unwrap();
        let b = gradcam.generate(&input, Some(TargetClass::Deepfake), &device).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_regular_map() {
        let normalized = normalize_importance_map(&[0.0, 1.0, 2.0, 4.0]);
        assert!(normalized[0].abs() < 1e-6);
        assert!(normalized[3] <= 1.0 && normalized[3] > 0.99);
        assert!(normalized.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_normalize_flat_map_is_all_zeros() {
        for value in [0.0, 3.5, -1.0] {
            let normalized = normalize_importance_map(&[value; 9]);
            assert!(normalized.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_normalize_empty_map() {
        assert!(normalize_importance_map(&[]).is_empty());
    }
}
