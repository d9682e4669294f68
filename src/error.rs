// Error types for the Facial Expressions Detection application

use thiserror::Error;

/// Main error type for the Facial Expressions Detection application
#[derive(Debug, Error)]
pub enum ExpressionDetectorError {
    #[error("Camera initialization failed: {0}")]
    CameraInit(String),

    #[error("Camera access denied")]
    CameraAccessDenied,

    #[error("Frame processing failed: {0}")]
    FrameProcessing(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Face detection failed: {0}")]
    FaceDetection(String),

    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(String),

    #[error("OpenCV error: {0}")]
    OpenCV(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Facial Expressions Detection operations
pub type Result<T> = std::result::Result<T, ExpressionDetectorError>;

// Conversion from nokhwa errors
impl From<nokhwa::NokhwaError> for ExpressionDetectorError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        match err {
            nokhwa::NokhwaError::StructureError { structure, error } => {
                ExpressionDetectorError::CameraInit(format!("{structure}: {error}"))
            }
            nokhwa::NokhwaError::OpenDeviceError(device, error) => {
                if error.to_lowercase().contains("permission") {
                    ExpressionDetectorError::CameraAccessDenied
                } else {
                    ExpressionDetectorError::CameraInit(format!("Device {device}: {error}"))
                }
            }
            nokhwa::NokhwaError::GetPropertyError { property, error } => {
                ExpressionDetectorError::CameraInit(format!("Property {property}: {error}"))
            }
            _ => ExpressionDetectorError::CameraInit(err.to_string()),
        }
    }
}

// Conversion from OpenCV errors
impl From<opencv::Error> for ExpressionDetectorError {
    fn from(err: opencv::Error) -> Self {
        ExpressionDetectorError::OpenCV(err.to_string())
    }
}

// Conversion from ONNX Runtime errors
impl From<ort::Error> for ExpressionDetectorError {
    fn from(err: ort::Error) -> Self {
        ExpressionDetectorError::OnnxRuntime(err.to_string())
    }
}
