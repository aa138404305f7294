//! Result types for detection operations

use serde::{Deserialize, Serialize};

/// Label reported for an authentic image
pub const LABEL_REAL: &str = "Real";

/// Label reported for a synthetically generated image
pub const LABEL_DEEPFAKE: &str = "AI-generated image";

/// Class targeted by a Grad-CAM explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetClass {
    /// Class 0: explain what makes the image look authentic
    Real,
    /// Class 1: explain what makes the image look generated
    Deepfake,
}

impl TargetClass {
    /// Target for a boolean deepfake decision
    #[must_use]
    pub fn from_decision(is_deepfake: bool) -> Self {
        if is_deepfake {
            Self::Deepfake
        } else {
            Self::Real
        }
    }
}

/// Model prediction for one image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label, [`LABEL_REAL`] or [`LABEL_DEEPFAKE`]
    pub label: String,
    /// Whether the image was classified as a deepfake
    pub is_deepfake: bool,
}

impl Prediction {
    /// Build a prediction from the thresholded decision
    #[must_use]
    pub fn from_decision(is_deepfake: bool) -> Self {
        let label = if is_deepfake { LABEL_DEEPFAKE } else { LABEL_REAL };
        Self {
            label: label.to_string(),
            is_deepfake,
        }
    }
}

/// Visual explanation attached to a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Reference (URL path) to the persisted heatmap overlay image
    pub gradcam_image: String,
    /// Human-readable interpretation of the overlay
    pub description: String,
}

impl Explanation {
    /// Build the standard description text for a label
    #[must_use]
    pub fn describe(label: &str) -> String {
        format!(
            "The highlighted regions show areas that contributed most to \
             classifying this image as {}. Red areas indicate regions that \
             strongly influenced the decision.",
            label.to_lowercase()
        )
    }
}

/// Complete outcome of one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    /// Whether the detection completed successfully
    pub success: bool,
    /// Prediction result
    pub prediction: Prediction,
    /// Visual explanation via Grad-CAM
    pub explanation: Explanation,
    /// Session identifier for the follow-up report export, if registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_labels() {
        let real = Prediction::from_decision(false);
        assert_eq!(real.label, "Real");
        assert!(!real.is_deepfake);

        let fake = Prediction::from_decision(true);
        assert_eq!(fake.label, "AI-generated image");
        assert!(fake.is_deepfake);
    }

    #[test]
    fn test_description_contains_lowercased_label() {
        let text = Explanation::describe(LABEL_DEEPFAKE);
        assert!(text.contains("ai-generated image"));

        let text = Explanation::describe(LABEL_REAL);
        assert!(text.contains("real"));
    }

    #[test]
    fn test_target_class_from_decision() {
        assert_eq!(TargetClass::from_decision(true), TargetClass::Deepfake);
        assert_eq!(TargetClass::from_decision(false), TargetClass::Real);
    }

    #[test]
    fn test_response_serialization() {
        let response = DetectionResponse {
            success: true,
            prediction: Prediction::from_decision(false),
            explanation: Explanation {
                gradcam_image: "/results/gradcam_20240101_000000_abcd1234.png".to_string(),
                description: Explanation::describe(LABEL_REAL),
            },
            session_id: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"label\":\"Real\""));
        assert!(!json.contains("session_id"));
    }
}
