//! Accuracy metrics for predictions against held-out occupancy

use crate::config::ModelKind;
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::models::Prediction;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Accuracy of one model on one split, or averaged over several
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Root mean squared error in beds
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Mean absolute percentage error as a fraction; absent when a true value is zero
    #[serde(rename = "MAPE")]
    pub mape: Option<f64>,
    /// Mean absolute error in beds
    #[serde(rename = "MAE")]
    pub mae: f64,
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::Alignment(format!(
            "Actual ({}) and predicted ({}) values must have the same non-zero length",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    Ok(mse.sqrt())
}

/// Mean absolute error
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    Ok(actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64)
}

/// Mean absolute percentage error as a fraction.
///
/// Fails with [`ForecastError::DivisionByZero`] when any actual value is zero.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    if let Some(position) = actual.iter().position(|a| *a == 0.0) {
        return Err(ForecastError::DivisionByZero(format!(
            "actual occupancy is zero at position {}",
            position
        )));
    }
    Ok(actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| ((a - p) / a).abs())
        .sum::<f64>()
        / actual.len() as f64)
}

/// Compare a prediction with the test window it was made for.
///
/// The dates of both must match exactly. An undefined MAPE is recorded as
/// `None` while RMSE and MAE are still reported.
pub fn compute(test: &Series, prediction: &Prediction) -> Result<ModelMetrics> {
    let test_dates = test.dates();
    let predicted_dates = prediction.dates();
    if test_dates != predicted_dates {
        return Err(ForecastError::Alignment(format!(
            "test window {}..={} ({} days) does not match the {} predicted days",
            test.first_date(),
            test.last_date(),
            test_dates.len(),
            predicted_dates.len()
        )));
    }

    let actual = test.values();
    let predicted = prediction.values();
    let mape = match mape(&actual, &predicted) {
        Ok(value) => Some(value),
        Err(ForecastError::DivisionByZero(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(ModelMetrics {
        rmse: rmse(&actual, &predicted)?,
        mape,
        mae: mae(&actual, &predicted)?,
    })
}

/// Arithmetic mean of each metric across splits.
///
/// MAPE is averaged only when every split has one. `None` for no input.
pub fn average(metrics: &[ModelMetrics]) -> Option<ModelMetrics> {
    if metrics.is_empty() {
        return None;
    }
    let n = metrics.len() as f64;
    let mean_of = |f: fn(&ModelMetrics) -> f64| metrics.iter().map(f).sum::<f64>() / n;

    let mape = metrics
        .iter()
        .map(|m| m.mape)
        .collect::<Option<Vec<f64>>>()
        .map(|values| values.iter().sum::<f64>() / n);

    Some(ModelMetrics {
        rmse: mean_of(|m| m.rmse),
        mape,
        mae: mean_of(|m| m.mae),
    })
}

/// Per-model metrics of one run.
///
/// Serialises every known model, with `null` for those that were not
/// requested or produced nothing usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    entries: BTreeMap<ModelKind, ModelMetrics>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ModelKind, metrics: ModelMetrics) {
        self.entries.insert(kind, metrics);
    }

    pub fn get(&self, kind: ModelKind) -> Option<&ModelMetrics> {
        self.entries.get(&kind)
    }

    pub fn contains(&self, kind: ModelKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Present entries in canonical model order
    pub fn iter(&self) -> impl Iterator<Item = (ModelKind, &ModelMetrics)> {
        self.entries.iter().map(|(kind, m)| (*kind, m))
    }
}

impl Serialize for MetricSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ModelKind::ALL.len()))?;
        for kind in ModelKind::ALL {
            map.serialize_entry(kind.name(), &self.entries.get(&kind))?;
        }
        map.end()
    }
}
