//! Run configuration: run modes, model identities and per-model parameters.
//!
//! Every run is described by an explicit [`RunRequest`]; nothing about the
//! current run lives in shared state. Model parameters deserialize from JSON
//! with every field optional, so `{}` or `null` requests a model with its
//! defaults while an absent key leaves the model out of the run.

use crate::data::Series;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How a run partitions the data and what it reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Predict beyond the known data; metrics come from a held-out tail
    #[default]
    Forecast,
    /// One holdout split; predictions and metrics both from the holdout
    Test,
    /// Three rolling-origin splits; metrics averaged across them
    Accurate,
}

impl RunMode {
    /// Lowercase name used in requests and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Forecast => "forecast",
            RunMode::Test => "test",
            RunMode::Accurate => "accurate",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "forecast" => Ok(RunMode::Forecast),
            "test" => Ok(RunMode::Test),
            "accurate" => Ok(RunMode::Accurate),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown run mode '{}'; expected forecast, test or accurate",
                other
            ))),
        }
    }
}

/// The three supported model families
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Seasonal autoregressive model (SARIMA)
    Autoregressive,
    /// Holt-Winters exponential smoothing
    ExponentialSmoothing,
    /// Random forest over calendar features
    TreeEnsemble,
}

impl ModelKind {
    /// Every model family in canonical order
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Autoregressive,
        ModelKind::ExponentialSmoothing,
        ModelKind::TreeEnsemble,
    ];

    /// Canonical request key
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Autoregressive => "autoregressive",
            ModelKind::ExponentialSmoothing => "exponential_smoothing",
            ModelKind::TreeEnsemble => "tree_ensemble",
        }
    }

    /// Name shown on the dashboard
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::Autoregressive => "Sarima",
            ModelKind::ExponentialSmoothing => "Holt-Winter",
            ModelKind::TreeEnsemble => "Random Forest",
        }
    }

    /// File the latest prediction of this model is written to
    pub fn artifact_file_name(&self) -> &'static str {
        match self {
            ModelKind::Autoregressive => "latest_sarima.csv",
            ModelKind::ExponentialSmoothing => "latest_holt_winter.csv",
            ModelKind::TreeEnsemble => "latest_random_forest.csv",
        }
    }

    /// Resolve a canonical name or dashboard alias
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "autoregressive" | "sarima" => Some(ModelKind::Autoregressive),
            "exponential_smoothing" | "holt_winter" | "holt_winters" => {
                Some(ModelKind::ExponentialSmoothing)
            }
            "tree_ensemble" | "random_forest" => Some(ModelKind::TreeEnsemble),
            _ => None,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SARIMA orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoregressiveConfig {
    /// Non-seasonal (p, d, q)
    pub order: (usize, usize, usize),
    /// Seasonal (P, D, Q, m)
    pub seasonal_order: (usize, usize, usize, usize),
    /// Optimiser iteration cap
    pub max_iterations: usize,
}

impl Default for AutoregressiveConfig {
    fn default() -> Self {
        Self {
            order: (2, 0, 0),
            seasonal_order: (1, 0, 2, 7),
            max_iterations: 500,
        }
    }
}

/// Form of a Holt-Winters trend or seasonal component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "add", alias = "additive")]
    Additive,
    #[serde(rename = "mul", alias = "multiplicative")]
    Multiplicative,
    #[serde(rename = "none")]
    None,
}

/// How Holt-Winters chooses its initial states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initialization {
    /// Derived from the first seasonal cycles
    #[default]
    Heuristic,
    /// Heuristic start refined by minimising the in-sample error
    Estimated,
}

/// Holt-Winters structure and optional fixed smoothing rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExponentialSmoothingConfig {
    pub trend: Component,
    pub damped_trend: bool,
    pub damping_trend: f64,
    pub seasonal: Component,
    pub seasonal_periods: usize,
    pub initialization_method: Initialization,
    /// Fixed level rate; when absent all three rates come from a grid search
    pub smoothing_level: Option<f64>,
    pub smoothing_trend: Option<f64>,
    pub smoothing_seasonal: Option<f64>,
}

impl Default for ExponentialSmoothingConfig {
    fn default() -> Self {
        Self {
            trend: Component::Additive,
            damped_trend: false,
            damping_trend: 0.98,
            seasonal: Component::Additive,
            seasonal_periods: 7,
            initialization_method: Initialization::Heuristic,
            smoothing_level: None,
            smoothing_trend: None,
            smoothing_seasonal: None,
        }
    }
}

/// Named rule for the number of features tried per split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureRule {
    Sqrt,
    Log2,
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    Rule(FeatureRule),
    /// Exact number of features, capped at the number available
    Count(usize),
    /// Fraction of all features, `1.0` means every feature
    Fraction(f64),
}

impl Default for MaxFeatures {
    fn default() -> Self {
        MaxFeatures::Fraction(1.0)
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeEnsembleConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// `"sqrt"`, `"log2"`, an integer count or a float fraction
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    /// Fraction of rows drawn per bootstrap sample
    pub max_samples: Option<f64>,
    pub min_impurity_decrease: f64,
    pub random_state: Option<u64>,
}

impl Default for TreeEnsembleConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::default(),
            bootstrap: true,
            max_samples: None,
            min_impurity_decrease: 0.0,
            random_state: None,
        }
    }
}

/// Parameters for one model family
#[derive(Debug, Clone, PartialEq)]
pub enum ModelConfig {
    Autoregressive(AutoregressiveConfig),
    ExponentialSmoothing(ExponentialSmoothingConfig),
    TreeEnsemble(TreeEnsembleConfig),
}

impl ModelConfig {
    /// Default parameters for `kind`
    pub fn default_for(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Autoregressive => ModelConfig::Autoregressive(Default::default()),
            ModelKind::ExponentialSmoothing => {
                ModelConfig::ExponentialSmoothing(Default::default())
            }
            ModelKind::TreeEnsemble => ModelConfig::TreeEnsemble(Default::default()),
        }
    }

    /// The family this configuration belongs to
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelConfig::Autoregressive(_) => ModelKind::Autoregressive,
            ModelConfig::ExponentialSmoothing(_) => ModelKind::ExponentialSmoothing,
            ModelConfig::TreeEnsemble(_) => ModelKind::TreeEnsemble,
        }
    }
}

/// A present key requests the model even when its body is `null`.
fn requested<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let body: Option<T> = Option::deserialize(deserializer)?;
    Ok(Some(body.unwrap_or_default()))
}

/// Requested models and their parameters.
///
/// A model takes part in a run iff its field is `Some`, even when the
/// contained configuration is all defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfigs {
    #[serde(
        default,
        deserialize_with = "requested",
        alias = "sarima",
        alias = "Sarima",
        skip_serializing_if = "Option::is_none"
    )]
    pub autoregressive: Option<AutoregressiveConfig>,

    #[serde(
        default,
        deserialize_with = "requested",
        alias = "holt_winter",
        alias = "Holt-Winter",
        skip_serializing_if = "Option::is_none"
    )]
    pub exponential_smoothing: Option<ExponentialSmoothingConfig>,

    #[serde(
        default,
        deserialize_with = "requested",
        alias = "random_forest",
        alias = "Random Forest",
        alias = "Random-Forest",
        skip_serializing_if = "Option::is_none"
    )]
    pub tree_ensemble: Option<TreeEnsembleConfig>,
}

impl ModelConfigs {
    /// No model requested
    pub fn none() -> Self {
        Self::default()
    }

    /// Every model requested with its defaults
    pub fn all_defaults() -> Self {
        ModelKind::ALL
            .into_iter()
            .fold(Self::none(), |configs, kind| {
                configs.with(ModelConfig::default_for(kind))
            })
    }

    /// Request a model with the given parameters, replacing earlier ones
    pub fn with(mut self, config: ModelConfig) -> Self {
        match config {
            ModelConfig::Autoregressive(c) => self.autoregressive = Some(c),
            ModelConfig::ExponentialSmoothing(c) => self.exponential_smoothing = Some(c),
            ModelConfig::TreeEnsemble(c) => self.tree_ensemble = Some(c),
        }
        self
    }

    /// Request a model with its defaults
    pub fn with_defaults(self, kind: ModelKind) -> Self {
        self.with(ModelConfig::default_for(kind))
    }

    /// Parameters for `kind`, if it was requested
    pub fn get(&self, kind: ModelKind) -> Option<ModelConfig> {
        match kind {
            ModelKind::Autoregressive => self
                .autoregressive
                .clone()
                .map(ModelConfig::Autoregressive),
            ModelKind::ExponentialSmoothing => self
                .exponential_smoothing
                .clone()
                .map(ModelConfig::ExponentialSmoothing),
            ModelKind::TreeEnsemble => self.tree_ensemble.clone().map(ModelConfig::TreeEnsemble),
        }
    }

    /// Only the models in `kinds`, keeping their parameters from `self`
    /// and falling back to defaults for those not configured here
    pub fn select(&self, kinds: &[ModelKind]) -> Self {
        kinds.iter().fold(Self::none(), |configs, &kind| {
            configs.with(
                self.get(kind)
                    .unwrap_or_else(|| ModelConfig::default_for(kind)),
            )
        })
    }

    /// Requested models in canonical order
    pub fn requested(&self) -> Vec<ModelConfig> {
        ModelKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind))
            .collect()
    }

    /// True when no model was requested
    pub fn is_empty(&self) -> bool {
        self.autoregressive.is_none()
            && self.exponential_smoothing.is_none()
            && self.tree_ensemble.is_none()
    }
}

fn default_horizon() -> usize {
    30
}

/// Run parameters as stored in a JSON request document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub models: ModelConfigs,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            mode: RunMode::default(),
            models: ModelConfigs::all_defaults(),
        }
    }
}

impl RunConfig {
    /// Parse a run configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a run configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Attach the series to forecast
    pub fn into_request(self, series: Series) -> RunRequest {
        RunRequest::new(series, self.horizon, self.mode, self.models)
    }
}

/// Everything a single orchestrator run needs
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub series: Series,
    pub horizon: usize,
    pub mode: RunMode,
    pub models: ModelConfigs,
}

impl RunRequest {
    pub fn new(series: Series, horizon: usize, mode: RunMode, models: ModelConfigs) -> Self {
        Self {
            series,
            horizon,
            mode,
            models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_present_key_requests_model() {
        let configs: ModelConfigs =
            serde_json::from_str(r#"{"tree_ensemble": {}, "sarima": null}"#).unwrap();
        assert_eq!(configs.tree_ensemble, Some(TreeEnsembleConfig::default()));
        assert_eq!(configs.autoregressive, Some(AutoregressiveConfig::default()));
        assert_eq!(configs.exponential_smoothing, None);
        assert_eq!(configs.requested().len(), 2);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let configs: ModelConfigs = serde_json::from_str(r#"{"prophet": {}}"#).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn test_partial_bodies_fill_defaults() {
        let configs: ModelConfigs = serde_json::from_str(
            r#"{
                "Holt-Winter": {"seasonal": "mul", "smoothing_level": 0.5},
                "Random Forest": {"n_estimators": 10, "max_features": "log2"}
            }"#,
        )
        .unwrap();

        let hw = configs.exponential_smoothing.unwrap();
        assert_eq!(hw.seasonal, Component::Multiplicative);
        assert_eq!(hw.trend, Component::Additive);
        assert_eq!(hw.smoothing_level, Some(0.5));
        assert_eq!(hw.seasonal_periods, 7);

        let rf = configs.tree_ensemble.unwrap();
        assert_eq!(rf.n_estimators, 10);
        assert_eq!(rf.max_features, MaxFeatures::Rule(FeatureRule::Log2));
        assert!(rf.bootstrap);
    }

    #[test]
    fn test_max_features_integer_is_a_count() {
        let parse = |body: &str| {
            serde_json::from_str::<TreeEnsembleConfig>(body)
                .unwrap()
                .max_features
        };
        assert_eq!(parse(r#"{"max_features": 1}"#), MaxFeatures::Count(1));
        assert_eq!(parse(r#"{"max_features": 3}"#), MaxFeatures::Count(3));
        assert_eq!(parse(r#"{"max_features": 0.5}"#), MaxFeatures::Fraction(0.5));
        assert_eq!(parse(r#"{"max_features": 1.0}"#), MaxFeatures::Fraction(1.0));
        assert_eq!(parse(r#"{"max_features": "sqrt"}"#), MaxFeatures::Rule(FeatureRule::Sqrt));
        assert_eq!(parse("{}"), MaxFeatures::Fraction(1.0));
    }

    #[test]
    fn test_sarima_orders_from_arrays() {
        let configs: ModelConfigs = serde_json::from_str(
            r#"{"autoregressive": {"order": [1, 1, 0], "seasonal_order": [0, 1, 1, 7]}}"#,
        )
        .unwrap();
        let ar = configs.autoregressive.unwrap();
        assert_eq!(ar.order, (1, 1, 0));
        assert_eq!(ar.seasonal_order, (0, 1, 1, 7));
        assert_eq!(ar.max_iterations, 500);
    }

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::from_json_str(r#"{"mode": "accurate"}"#).unwrap();
        assert_eq!(config.mode, RunMode::Accurate);
        assert_eq!(config.horizon, 30);
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!("Test".parse::<RunMode>().unwrap(), RunMode::Test);
        assert!(matches!(
            "weekly".parse::<RunMode>(),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(serde_json::from_str::<RunConfig>(r#"{"mode": "weekly"}"#).is_err());
    }

    #[test]
    fn test_model_kind_aliases() {
        assert_eq!(ModelKind::from_name("Sarima"), Some(ModelKind::Autoregressive));
        assert_eq!(
            ModelKind::from_name("Holt-Winter"),
            Some(ModelKind::ExponentialSmoothing)
        );
        assert_eq!(
            ModelKind::from_name("Random Forest"),
            Some(ModelKind::TreeEnsemble)
        );
        assert_eq!(ModelKind::from_name("lstm"), None);
    }

    #[test]
    fn test_all_defaults_requests_every_model() {
        let configs = ModelConfigs::all_defaults();
        let kinds: Vec<ModelKind> = configs.requested().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, ModelKind::ALL.to_vec());
    }

    #[test]
    fn test_select_keeps_configured_parameters() {
        let configured = ModelConfigs::none().with(ModelConfig::TreeEnsemble(TreeEnsembleConfig {
            n_estimators: 10,
            ..TreeEnsembleConfig::default()
        }));
        let kinds: Vec<ModelKind> = ["random-forest", "Sarima"]
            .into_iter()
            .filter_map(ModelKind::from_name)
            .collect();

        let selected = configured.select(&kinds);
        assert_eq!(selected.tree_ensemble.unwrap().n_estimators, 10);
        assert_eq!(selected.autoregressive, Some(AutoregressiveConfig::default()));
        assert!(selected.exponential_smoothing.is_none());
        assert!(configured.select(&[]).is_empty());
    }
}
