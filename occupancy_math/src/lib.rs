//! # Occupancy Math
//!
//! Numeric building blocks used by the occupancy forecasting models.
//! Nothing in this crate knows about dates, models or runs; it works on
//! plain `f64` slices.
//!
//! - Mann-Kendall monotonic trend test
//! - Kruskal-Wallis H test for equality across groups
//! - Bounded Nelder-Mead minimisation
//! - Lag differencing / integration and lag polynomial products

use thiserror::Error;

pub mod differencing;
pub mod optimization;
pub mod polynomial;
pub mod seasonality;
pub mod trend;

pub use crate::optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use crate::seasonality::{kruskal_wallis, KruskalWallisResult};
pub use crate::trend::{mann_kendall, MannKendallResult, TrendDirection};

/// Errors that can occur in occupancy math calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for occupancy math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
