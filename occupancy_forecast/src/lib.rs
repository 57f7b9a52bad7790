//! # Occupancy Forecast
//!
//! Hospital bed occupancy forecasting from a daily history of occupied beds.
//!
//! ## Features
//!
//! - Daily occupancy series with strict calendar validation and CSV loading
//! - Three model families behind one [`ForecastModel`] contract:
//!   seasonal ARIMA, Holt-Winters exponential smoothing and a random forest
//!   over calendar features
//! - Three run modes: `forecast` (predict the future, score a held-out tail),
//!   `test` (one holdout split) and `accurate` (three rolling-origin splits)
//! - RMSE, MAPE and MAE per model, averaged across rolling splits
//! - One `date,occupancy` CSV artifact per model, replaced on every run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use occupancy_forecast::{
//!     ArtifactWriter, DataLoader, ModelConfigs, Orchestrator, RunMode, RunRequest,
//! };
//!
//! # fn main() -> occupancy_forecast::Result<()> {
//! let series = DataLoader::from_csv("occupancy.csv")?;
//!
//! let request = RunRequest::new(series, 30, RunMode::Test, ModelConfigs::all_defaults());
//! let mut orchestrator = Orchestrator::new(ArtifactWriter::new("output"));
//! let metrics = orchestrator.run(&request)?;
//!
//! for (model, m) in metrics.iter() {
//!     println!("{}: RMSE {:.2}, MAE {:.2}", model.label(), m.rmse, m.mae);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod split;
pub mod summary;
pub mod utils;

// Re-export commonly used types
pub use crate::artifacts::ArtifactWriter;
pub use crate::config::{
    ModelConfig, ModelConfigs, ModelKind, RunConfig, RunMode, RunRequest,
};
pub use crate::data::{DataLoader, Observation, Series};
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::{MetricSet, ModelMetrics};
pub use crate::models::{adapter_for, ForecastModel, Prediction, PredictionSet};
pub use crate::orchestrator::{Orchestrator, RunReport, RunStage};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
