//! Run coordination: validation, splitting, model passes, metrics and artifacts

use crate::artifacts::ArtifactWriter;
use crate::config::{ModelConfig, ModelKind, RunMode, RunRequest};
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::metrics::{self, MetricSet, ModelMetrics};
use crate::models::{adapter_for, ForecastModel, Prediction, PredictionSet};
use crate::split::{split, Split};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Stages a run passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Validating,
    Splitting,
    Fitting,
    Aggregating,
    Writing,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Validating => "validating",
            RunStage::Splitting => "splitting",
            RunStage::Fitting => "fitting",
            RunStage::Aggregating => "aggregating",
            RunStage::Writing => "writing",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(stage: RunStage) {
    debug!(stage = %stage, "run stage");
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Metrics returned to the caller
    pub metrics: MetricSet,
    /// Predictions handed to the artifact writer
    pub predictions: PredictionSet,
    /// Files written
    pub artifacts: Vec<PathBuf>,
}

/// Drives the requested models through the splits of one run.
///
/// The orchestrator keeps no state about past runs. `run` takes `&mut self`
/// so two runs can never overlap on one instance and share its output
/// directory.
#[derive(Debug)]
pub struct Orchestrator {
    writer: ArtifactWriter,
    adapters: BTreeMap<ModelKind, Box<dyn ForecastModel>>,
}

impl Orchestrator {
    /// Orchestrator using the built-in adapter of every model family
    pub fn new(writer: ArtifactWriter) -> Self {
        let adapters = ModelKind::ALL
            .into_iter()
            .map(|kind| (kind, adapter_for(kind)))
            .collect();
        Self { writer, adapters }
    }

    /// Replace the adapter serving `adapter.kind()`
    pub fn with_adapter(mut self, adapter: Box<dyn ForecastModel>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Execute a run and return its metrics
    pub fn run(&mut self, request: &RunRequest) -> Result<MetricSet> {
        self.run_detailed(request).map(|report| report.metrics)
    }

    /// Execute a run and return metrics, predictions and written files
    pub fn run_detailed(&mut self, request: &RunRequest) -> Result<RunReport> {
        info!(
            mode = %request.mode,
            horizon = request.horizon,
            days = request.series.len(),
            "starting forecast run"
        );

        let result = self.execute(request);
        match &result {
            Ok(report) => {
                enter(RunStage::Done);
                info!(
                    models = report.metrics.len(),
                    artifacts = report.artifacts.len(),
                    "forecast run finished"
                );
            }
            Err(e) => warn!(stage = %RunStage::Failed, error = %e, "forecast run failed"),
        }
        result
    }

    fn execute(&self, request: &RunRequest) -> Result<RunReport> {
        enter(RunStage::Validating);
        let configs = request.models.requested();
        if configs.is_empty() {
            return Err(ForecastError::NoModelSelected);
        }
        if request.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be a positive number of days".to_string(),
            ));
        }

        enter(RunStage::Splitting);
        let splits = split(&request.series, request.horizon, request.mode)?;

        enter(RunStage::Fitting);
        let (metrics, predictions) = match request.mode {
            RunMode::Test => self.holdout_run(&splits, request.horizon, &configs),
            RunMode::Forecast => {
                self.forecast_run(&request.series, &splits, request.horizon, &configs)
            }
            RunMode::Accurate => self.rolling_run(&splits, request.horizon, &configs),
        };

        enter(RunStage::Writing);
        let artifacts = self.writer.write_all(&predictions)?;

        Ok(RunReport {
            metrics,
            predictions,
            artifacts,
        })
    }

    /// Single split whose predictions are both scored and written
    fn holdout_run(
        &self,
        splits: &[Split],
        horizon: usize,
        configs: &[ModelConfig],
    ) -> (MetricSet, PredictionSet) {
        let mut metrics = MetricSet::new();
        let mut predictions = PredictionSet::new();
        if let Some(holdout) = splits.last() {
            predictions = self.fit_pass(&holdout.train, horizon, configs);
            enter(RunStage::Aggregating);
            for (kind, metric) in score(holdout, &predictions) {
                metrics.insert(kind, metric);
            }
        }
        (metrics, predictions)
    }

    /// Production pass on the full series plus an independent holdout pass for metrics
    fn forecast_run(
        &self,
        series: &Series,
        splits: &[Split],
        horizon: usize,
        configs: &[ModelConfig],
    ) -> (MetricSet, PredictionSet) {
        let production = self.fit_pass(series, horizon, configs);
        let (metrics, _) = self.holdout_run(splits, horizon, configs);
        (metrics, production)
    }

    /// Every rolling split, metrics averaged, final split's predictions kept
    fn rolling_run(
        &self,
        splits: &[Split],
        horizon: usize,
        configs: &[ModelConfig],
    ) -> (MetricSet, PredictionSet) {
        let mut per_model: BTreeMap<ModelKind, Vec<ModelMetrics>> = BTreeMap::new();
        let mut last = PredictionSet::new();

        for (i, s) in splits.iter().enumerate() {
            debug!(split = i + 1, of = splits.len(), train = s.train.len(), "rolling split");
            let predictions = self.fit_pass(&s.train, horizon, configs);
            for (kind, metric) in score(s, &predictions) {
                per_model.entry(kind).or_default().push(metric);
            }
            last = predictions;
        }

        enter(RunStage::Aggregating);
        let mut metrics = MetricSet::new();
        for (kind, values) in per_model {
            if let Some(avg) = metrics::average(&values) {
                metrics.insert(kind, avg);
            }
        }
        (metrics, last)
    }

    /// Fit every requested model on `train`; failures leave the model out
    fn fit_pass(&self, train: &Series, horizon: usize, configs: &[ModelConfig]) -> PredictionSet {
        let mut predictions = PredictionSet::new();
        for config in configs {
            let kind = config.kind();
            let Some(adapter) = self.adapters.get(&kind) else {
                warn!(model = %kind, "no adapter registered");
                continue;
            };

            let outcome = adapter
                .fit_and_predict(train, horizon, config)
                .and_then(|p| check_horizon(kind, p, horizon));
            match outcome {
                Ok(prediction) => {
                    debug!(model = %kind, train = train.len(), "model fitted");
                    predictions.insert(kind, prediction);
                }
                Err(e) => warn!(model = %kind, error = %e, "model produced no prediction"),
            }
        }
        predictions
    }
}

/// A prediction must cover exactly `horizon` days
fn check_horizon(kind: ModelKind, prediction: Prediction, horizon: usize) -> Result<Prediction> {
    if prediction.len() != horizon {
        return Err(ForecastError::Alignment(format!(
            "{} predicted {} days instead of {}",
            kind,
            prediction.len(),
            horizon
        )));
    }
    Ok(prediction)
}

/// Metrics for every prediction that lines up with the split's test window
fn score(split: &Split, predictions: &PredictionSet) -> Vec<(ModelKind, ModelMetrics)> {
    predictions
        .iter()
        .filter_map(|(kind, prediction)| match metrics::compute(&split.test, prediction) {
            Ok(metric) => Some((kind, metric)),
            Err(e) => {
                warn!(model = %kind, error = %e, "metrics unavailable");
                None
            }
        })
        .collect()
}
