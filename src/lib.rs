//! # Bedcast
//!
//! Workspace facade for hospital bed occupancy forecasting.
//!
//! - [`occupancy_math`]: trend and seasonality tests, Nelder-Mead, lag polynomials
//! - [`occupancy_forecast`]: series handling, the three model families, run
//!   orchestration, metrics and prediction artifacts
//!
//! ```
//! use bedcast_workspace::occupancy_forecast::{ModelKind, RunMode};
//!
//! assert_eq!(ModelKind::TreeEnsemble.label(), "Random Forest");
//! assert_eq!("accurate".parse::<RunMode>().unwrap(), RunMode::Accurate);
//! ```

pub use occupancy_forecast;
pub use occupancy_math;
