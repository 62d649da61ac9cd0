//! Error types for the cropwise recommendation engine

use thiserror::Error;

/// Result type alias for cropwise operations
pub type Result<T> = std::result::Result<T, CropwiseError>;

/// Main error type for the cropwise engine
#[derive(Error, Debug)]
pub enum CropwiseError {
    #[error("Dataset not found at {0}")]
    DataNotFound(String),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Required column missing: {0}")]
    MissingColumn(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("No models were successfully trained: {0}")]
    NoViableModel(String),

    #[error("Recommender not properly initialized")]
    NotInitialized,

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Scaler has already been fitted")]
    AlreadyFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for CropwiseError {
    fn from(err: polars::error::PolarsError) -> Self {
        CropwiseError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CropwiseError {
    fn from(err: serde_json::Error) -> Self {
        CropwiseError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CropwiseError {
    fn from(err: ndarray::ShapeError) -> Self {
        CropwiseError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
