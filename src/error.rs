//! Error types for deepfake detection operations
//!
//! One error enum covers the whole pipeline. Helper constructors keep call
//! sites short, and `is_input_error` separates caller mistakes (bad
//! uploads) from internal failures for logging and status mapping.

use std::path::Path;

/// Errors that can occur during detection, explanation and storage
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode or encode failure from the imaging layer
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// The uploaded payload cannot be analyzed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The declared upload content type is not accepted
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Model construction, checkpoint loading or inference failure
    #[error("Model error: {0}")]
    Model(String),

    /// Grad-CAM explanation failure
    #[error("Explanation error: {0}")]
    Explanation(String),

    /// Artifact persistence or retention failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// No cached session with the given id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DetectionError {
    /// Invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Unsupported content type error
    pub fn unsupported_content_type<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedContentType(msg.into())
    }

    /// Model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Explanation error
    pub fn explanation<S: Into<String>>(msg: S) -> Self {
        Self::Explanation(msg.into())
    }

    /// Storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Missing session error
    pub fn session_not_found<S: Into<String>>(id: S) -> Self {
        Self::SessionNotFound(id.into())
    }

    /// Configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// File I/O error that reports only the file name, not the full path
    pub fn file_io_error(path: &Path, error: &std::io::Error) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self::Storage(format!("file operation failed on '{name}': {error}"))
    }

    /// Whether this error was caused by the caller's input
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedContentType(_)
        )
    }
}

/// Convenient result type for detection operations
pub type Result<T> = std::result::Result<T, DetectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(
            DetectionError::invalid_input("bad"),
            DetectionError::InvalidInput(_)
        ));
        assert!(matches!(
            DetectionError::model("weights"),
            DetectionError::Model(_)
        ));
        assert!(matches!(
            DetectionError::session_not_found("abc"),
            DetectionError::SessionNotFound(_)
        ));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(DetectionError::invalid_input("x").is_input_error());
        assert!(DetectionError::unsupported_content_type("text/plain").is_input_error());
        assert!(!DetectionError::storage("disk").is_input_error());
        assert!(!DetectionError::internal("bug").is_input_error());
    }

    #[test]
    fn test_file_io_error_hides_directory() {
        let err = DetectionError::file_io_error(
            Path::new("/srv/private/results/gradcam_x.png"),
            &std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("gradcam_x.png"));
        assert!(!text.contains("/srv/private"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DetectionError = io.into();
        assert!(matches!(err, DetectionError::Io(_)));
    }
}
