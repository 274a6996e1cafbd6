// VehicleDetect 🚀 AGPL-3.0 License

//! Error types for the vehicle detection library.

use std::fmt;

/// Result type alias for detection operations.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Main error type for the vehicle detection library.
#[derive(Debug)]
pub enum DetectError {
    /// Invalid configuration (bad hyperparameter, unsupported device, ...).
    ConfigError(String),
    /// Error reading or interpreting the dataset (manifest, images, labels).
    DatasetError(String),
    /// Error resolving, loading, or saving model weights.
    CheckpointError(String),
    /// Error decoding or encoding images.
    ImageError(String),
    /// Error during the training loop.
    TrainingError(String),
    /// Error during model inference.
    InferenceError(String),
    /// Error parsing manifest or checkpoint metadata.
    MetadataError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::DatasetError(msg) => write!(f, "Dataset error: {msg}"),
            Self::CheckpointError(msg) => write!(f, "Checkpoint error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::TrainingError(msg) => write!(f, "Training error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::MetadataError(msg) => write!(f, "Metadata error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DetectError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for DetectError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}
