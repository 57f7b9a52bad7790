//! Error types for the occupancy_forecast crate

use occupancy_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the occupancy_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The series is too short for the requested horizon and run mode
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The run request names none of the known models
    #[error("No model selected: at least one model configuration is required")]
    NoModelSelected,

    /// A model adapter failed to fit or to forecast
    #[error("Model fit error ({model}): {reason}")]
    ModelFit { model: String, reason: String },

    /// Test and prediction dates do not line up
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// A percentage metric was asked to divide by a zero observation
    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from the numeric building blocks
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error while writing or reading CSV records
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error while decoding a run configuration
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ForecastError {
    /// Shorthand for a [`ForecastError::ModelFit`]
    pub fn model_fit(model: impl Into<String>, reason: impl Into<String>) -> Self {
        ForecastError::ModelFit {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
