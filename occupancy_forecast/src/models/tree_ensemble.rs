//! Random forest regression over calendar features

use crate::config::{FeatureRule, MaxFeatures, ModelConfig, ModelKind, TreeEnsembleConfig};
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::models::decision_tree::{RegressionTree, TreeParams};
use crate::models::{config_mismatch, ForecastModel, Prediction, TrainedForecastModel};
use crate::utils::{calendar_features, future_dates};
use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

/// Seed used when the configuration leaves `random_state` unset
pub const DEFAULT_SEED: u64 = 42;

const FEATURE_COUNT: usize = 4;

fn forest_error(reason: impl Into<String>) -> ForecastError {
    ForecastError::model_fit(ModelKind::TreeEnsemble.name(), reason)
}

/// Adapter for the tree-ensemble family
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeEnsembleAdapter;

impl ForecastModel for TreeEnsembleAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::TreeEnsemble
    }

    fn fit_and_predict(
        &self,
        train: &Series,
        horizon: usize,
        config: &ModelConfig,
    ) -> Result<Prediction> {
        let config = match config {
            ModelConfig::TreeEnsemble(config) => config,
            other => return Err(config_mismatch(self.kind(), other)),
        };

        let forest = RandomForest::new(config)?;
        let trained = forest.train(&train.dates(), &train.values())?;
        let forecast = trained.predict_after(train.last_date(), horizon)?;
        Prediction::from_forecast(self.kind(), train.last_date(), &forecast)
    }
}

/// Validated forest hyperparameters
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    bootstrap: bool,
    max_samples: Option<f64>,
    min_impurity_decrease: f64,
    seed: u64,
}

/// Forest of fitted trees
#[derive(Debug, Clone)]
pub struct TrainedRandomForest {
    trees: Vec<RegressionTree>,
    /// Last training date, the forecast origin
    last_date: NaiveDate,
}

impl RandomForest {
    pub fn new(config: &TreeEnsembleConfig) -> Result<Self> {
        if config.n_estimators == 0 {
            return Err(forest_error("n_estimators must be at least 1"));
        }
        if config.max_depth == Some(0) {
            return Err(forest_error("max_depth must be at least 1"));
        }
        if config.min_samples_split < 2 {
            return Err(forest_error("min_samples_split must be at least 2"));
        }
        if config.min_samples_leaf == 0 {
            return Err(forest_error("min_samples_leaf must be at least 1"));
        }
        if config.max_features == MaxFeatures::Count(0) {
            return Err(forest_error("max_features count must be at least 1"));
        }
        if let MaxFeatures::Fraction(f) = config.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(forest_error(format!(
                    "max_features fraction must be within (0, 1], got {}",
                    f
                )));
            }
        }
        if let Some(f) = config.max_samples {
            if !(f > 0.0 && f <= 1.0) {
                return Err(forest_error(format!(
                    "max_samples must be within (0, 1], got {}",
                    f
                )));
            }
        }
        if !(config.min_impurity_decrease >= 0.0) {
            return Err(forest_error("min_impurity_decrease must be non-negative"));
        }

        Ok(Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features,
            bootstrap: config.bootstrap,
            max_samples: config.max_samples,
            min_impurity_decrease: config.min_impurity_decrease,
            seed: config.random_state.unwrap_or(DEFAULT_SEED),
        })
    }

    /// Features tried per split for `n_features` inputs
    fn features_per_split(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let count = match self.max_features {
            MaxFeatures::Rule(FeatureRule::Sqrt) => n.sqrt().floor() as usize,
            MaxFeatures::Rule(FeatureRule::Log2) => n.log2().floor() as usize,
            MaxFeatures::Count(count) => count,
            MaxFeatures::Fraction(f) => (f * n).floor() as usize,
        };
        count.clamp(1, n_features.max(1))
    }

    /// Rows drawn per bootstrap sample
    fn draws(&self, n_rows: usize) -> usize {
        match self.max_samples {
            Some(f) => ((f * n_rows as f64).round() as usize).max(1),
            None => n_rows,
        }
    }

    /// Fit one tree per estimator, each with its own seeded generator
    pub fn train(&self, dates: &[NaiveDate], targets: &[f64]) -> Result<TrainedRandomForest> {
        if dates.is_empty() || dates.len() != targets.len() {
            return Err(forest_error(format!(
                "needs matching non-empty dates and targets, got {} and {}",
                dates.len(),
                targets.len()
            )));
        }

        let features: Vec<Vec<f64>> = dates
            .iter()
            .map(|d| calendar_features(*d).to_vec())
            .collect();
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.features_per_split(FEATURE_COUNT),
            min_impurity_decrease: self.min_impurity_decrease,
        };
        let n_rows = features.len();
        let draws = self.draws(n_rows);

        let trees: Vec<RegressionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = if self.bootstrap {
                    (0..draws).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                RegressionTree::fit(&features, targets, &sample, &params, &mut rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            max_features = params.max_features,
            rows = n_rows,
            "random forest fitted"
        );

        Ok(TrainedRandomForest {
            trees,
            last_date: dates[dates.len() - 1],
        })
    }
}

impl TrainedRandomForest {
    /// Mean tree prediction for `date`
    pub fn predict_date(&self, date: NaiveDate) -> f64 {
        let row = calendar_features(date);
        let total: f64 = self.trees.iter().map(|tree| tree.predict_one(&row)).sum();
        total / self.trees.len() as f64
    }

    /// Raw predictions for the `horizon` days after `last_date`
    pub fn predict_after(&self, last_date: NaiveDate, horizon: usize) -> Result<Vec<f64>> {
        Ok(future_dates(last_date, horizon)?
            .into_iter()
            .map(|date| self.predict_date(date))
            .collect())
    }
}

impl TrainedForecastModel for TrainedRandomForest {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        self.predict_after(self.last_date, horizon)
    }
}
