//! Forecasting models behind a uniform fit-and-predict contract

use crate::config::{ModelConfig, ModelKind};
use crate::data::Observation;
use crate::error::{ForecastError, Result};
use crate::utils::{future_dates, to_bed_count};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

pub mod autoregressive;
pub mod decision_tree;
pub mod exponential_smoothing;
pub mod tree_ensemble;

pub use autoregressive::AutoregressiveAdapter;
pub use exponential_smoothing::{ExponentialSmoothingAdapter, SmoothingParams};
pub use tree_ensemble::TreeEnsembleAdapter;

/// Daily occupancy predicted for the days following a training series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    observations: Vec<Observation>,
}

impl Prediction {
    /// Build a prediction from raw model output.
    ///
    /// Dates start the day after `last_date`; values are rounded half away
    /// from zero and negatives clamp to zero. Any non-finite value fails the
    /// fit of `kind`.
    pub fn from_forecast(kind: ModelKind, last_date: NaiveDate, values: &[f64]) -> Result<Self> {
        let dates = future_dates(last_date, values.len())?;
        let observations = dates
            .into_iter()
            .zip(values)
            .map(|(date, &value)| {
                to_bed_count(value)
                    .map(|occupancy| Observation { date, occupancy })
                    .ok_or_else(|| {
                        ForecastError::model_fit(
                            kind.name(),
                            format!("non-finite forecast value for {}", date),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { observations })
    }

    /// Predicted observations in date order
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn occupancy(&self) -> Vec<u32> {
        self.observations.iter().map(|o| o.occupancy).collect()
    }

    /// Predicted counts as floating point values
    pub fn values(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(|o| f64::from(o.occupancy))
            .collect()
    }
}

/// Predictions of one pass, at most one per model family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionSet {
    predictions: BTreeMap<ModelKind, Prediction>,
}

impl PredictionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the prediction of `kind`, replacing an earlier one
    pub fn insert(&mut self, kind: ModelKind, prediction: Prediction) {
        self.predictions.insert(kind, prediction);
    }

    pub fn get(&self, kind: ModelKind) -> Option<&Prediction> {
        self.predictions.get(&kind)
    }

    pub fn contains(&self, kind: ModelKind) -> bool {
        self.predictions.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Predictions in canonical model order
    pub fn iter(&self) -> impl Iterator<Item = (ModelKind, &Prediction)> {
        self.predictions.iter().map(|(kind, p)| (*kind, p))
    }
}

/// A model fitted to one training series, ready to forecast
pub trait TrainedForecastModel: Debug {
    /// Raw forecasts for the `horizon` steps after the training data
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>>;
}

/// Stateless adapter for one model family.
///
/// Configuration arrives with every call and nothing is retained between
/// calls, so one adapter serves any number of runs.
pub trait ForecastModel: Debug + Send + Sync {
    /// Model family implemented by this adapter
    fn kind(&self) -> ModelKind;

    /// Fit on `train` and predict the `horizon` days that follow it
    fn fit_and_predict(
        &self,
        train: &crate::data::Series,
        horizon: usize,
        config: &ModelConfig,
    ) -> Result<Prediction>;
}

/// Look up the adapter implementing `kind`
pub fn adapter_for(kind: ModelKind) -> Box<dyn ForecastModel> {
    match kind {
        ModelKind::Autoregressive => Box::new(AutoregressiveAdapter),
        ModelKind::ExponentialSmoothing => Box::new(ExponentialSmoothingAdapter),
        ModelKind::TreeEnsemble => Box::new(TreeEnsembleAdapter),
    }
}

/// Error for a configuration handed to the wrong adapter
pub(crate) fn config_mismatch(expected: ModelKind, config: &ModelConfig) -> ForecastError {
    ForecastError::InvalidParameter(format!(
        "{} adapter received a {} configuration",
        expected,
        config.kind()
    ))
}
