//! Holt-Winters exponential smoothing with a deterministic smoothing-rate search

use crate::config::{
    Component, ExponentialSmoothingConfig, Initialization, ModelConfig, ModelKind,
};
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::models::{config_mismatch, ForecastModel, Prediction, TrainedForecastModel};
use chrono::Datelike;
use occupancy_math::{kruskal_wallis, mann_kendall, mean, nelder_mead, NelderMeadConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Significance level of the trend and seasonality presence tests
const PRESENCE_ALPHA: f64 = 0.05;
/// Grid resolution in hundredths
const GRID_STEPS: usize = 100;
/// Largest level rate on the grid, in hundredths
const MAX_LEVEL_STEP: usize = 97;

fn ewm_error(reason: impl Into<String>) -> ForecastError {
    ForecastError::model_fit(ModelKind::ExponentialSmoothing.name(), reason)
}

/// Smoothing rates for level, trend and season
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub level: f64,
    pub trend: f64,
    pub seasonal: f64,
}

impl SmoothingParams {
    pub fn new(level: f64, trend: f64, seasonal: f64) -> Self {
        Self {
            level,
            trend,
            seasonal,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("smoothing_level", self.level),
            ("smoothing_trend", self.trend),
            ("smoothing_seasonal", self.seasonal),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ewm_error(format!(
                    "{} must be within [0, 1], got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }
}

/// Adapter for the Holt-Winters family
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialSmoothingAdapter;

impl ExponentialSmoothingAdapter {
    /// Smoothing rates used when fitting `train` for `horizon` days.
    ///
    /// Explicit rates in `config` win; missing trend and seasonal rates are
    /// then zero. Without an explicit level rate the grid search decides.
    pub fn select_smoothing(
        &self,
        train: &Series,
        horizon: usize,
        config: &ExponentialSmoothingConfig,
    ) -> Result<SmoothingParams> {
        if let Some(level) = config.smoothing_level {
            let params = SmoothingParams::new(
                level,
                config.smoothing_trend.unwrap_or(0.0),
                config.smoothing_seasonal.unwrap_or(0.0),
            );
            params.validate()?;
            return Ok(params);
        }

        let model = HoltWinters::from_config(config)?;
        GridSearch::new(&model, train, horizon)?.run()
    }
}

impl ForecastModel for ExponentialSmoothingAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::ExponentialSmoothing
    }

    fn fit_and_predict(
        &self,
        train: &Series,
        horizon: usize,
        config: &ModelConfig,
    ) -> Result<Prediction> {
        let config = match config {
            ModelConfig::ExponentialSmoothing(config) => config,
            other => return Err(config_mismatch(self.kind(), other)),
        };

        let model = HoltWinters::from_config(config)?;
        let values = train.values();
        model.check_data(&values)?;

        let params = self.select_smoothing(train, horizon, config)?;
        debug!(
            level = params.level,
            trend = params.trend,
            seasonal = params.seasonal,
            "holt-winters smoothing rates"
        );

        let trained = model.train(&values, params)?;
        let forecast = trained.forecast(horizon)?;
        Prediction::from_forecast(self.kind(), train.last_date(), &forecast)
    }
}

/// Structure of a Holt-Winters model, without rates or states
#[derive(Debug, Clone)]
pub struct HoltWinters {
    trend: Component,
    damped: bool,
    damping: f64,
    seasonal: Component,
    period: usize,
    initialization: Initialization,
}

/// Level, trend and seasonal states
#[derive(Debug, Clone, PartialEq)]
struct State {
    level: f64,
    trend: f64,
    /// Indexed by `t % period`
    seasonals: Vec<f64>,
}

/// Holt-Winters model after smoothing through the training data
#[derive(Debug, Clone)]
pub struct TrainedHoltWinters {
    model: HoltWinters,
    params: SmoothingParams,
    state: State,
    /// Number of observations smoothed
    n: usize,
}

impl HoltWinters {
    pub fn from_config(config: &ExponentialSmoothingConfig) -> Result<Self> {
        if config.seasonal != Component::None && config.seasonal_periods < 2 {
            return Err(ewm_error(format!(
                "seasonal_periods must be at least 2, got {}",
                config.seasonal_periods
            )));
        }
        if config.seasonal != Component::None && config.seasonal_periods.checked_mul(2).is_none() {
            return Err(ewm_error(format!(
                "seasonal_periods {} is too large to initialise from two cycles",
                config.seasonal_periods
            )));
        }
        if config.damped_trend && !(config.damping_trend > 0.0 && config.damping_trend <= 1.0) {
            return Err(ewm_error(format!(
                "damping_trend must be within (0, 1], got {}",
                config.damping_trend
            )));
        }

        Ok(Self {
            trend: config.trend,
            damped: config.damped_trend && config.trend != Component::None,
            damping: config.damping_trend,
            seasonal: config.seasonal,
            period: if config.seasonal == Component::None {
                1
            } else {
                config.seasonal_periods
            },
            initialization: config.initialization_method,
        })
    }

    /// Damping factor applied to the trend each step
    fn phi(&self) -> f64 {
        if self.damped {
            self.damping
        } else {
            1.0
        }
    }

    fn is_seasonal(&self) -> bool {
        self.seasonal != Component::None
    }

    /// Shortest series the model can be initialised from
    pub fn min_observations(&self) -> usize {
        if self.is_seasonal() {
            2 * self.period
        } else {
            2
        }
    }

    /// Reject series the model cannot be fitted to
    pub fn check_data(&self, values: &[f64]) -> Result<()> {
        let required = self.min_observations();
        if values.len() < required {
            return Err(ewm_error(format!(
                "needs at least {} observations, got {}",
                required,
                values.len()
            )));
        }

        let multiplicative =
            self.trend == Component::Multiplicative || self.seasonal == Component::Multiplicative;
        if multiplicative && values.iter().any(|v| *v <= 0.0) {
            return Err(ewm_error(
                "multiplicative components require strictly positive occupancy",
            ));
        }
        Ok(())
    }

    fn heuristic_state(&self, values: &[f64]) -> State {
        if !self.is_seasonal() {
            let trend = match self.trend {
                Component::Additive => values[1] - values[0],
                Component::Multiplicative => values[1] / values[0],
                Component::None => 0.0,
            };
            return State {
                level: values[0],
                trend,
                seasonals: vec![self.neutral_season()],
            };
        }

        let m = self.period;
        let first = &values[..m];
        let second = &values[m..2 * m];
        let first_mean = mean(first).unwrap_or(0.0);
        let second_mean = mean(second).unwrap_or(first_mean);

        let trend = match self.trend {
            Component::Additive => (second_mean - first_mean) / m as f64,
            Component::Multiplicative => (second_mean / first_mean).powf(1.0 / m as f64),
            Component::None => 0.0,
        };

        let mut seasonals: Vec<f64> = match self.seasonal {
            Component::Multiplicative => first.iter().map(|y| y / first_mean).collect(),
            _ => first.iter().map(|y| y - first_mean).collect(),
        };
        self.normalize(&mut seasonals);

        State {
            level: first_mean,
            trend,
            seasonals,
        }
    }

    fn neutral_season(&self) -> f64 {
        if self.seasonal == Component::Multiplicative {
            1.0
        } else {
            0.0
        }
    }

    /// Additive seasonals sum to zero, multiplicative ones average one
    fn normalize(&self, seasonals: &mut [f64]) {
        let centre = mean(seasonals).unwrap_or(0.0);
        match self.seasonal {
            Component::Additive => seasonals.iter_mut().for_each(|s| *s -= centre),
            Component::Multiplicative if centre.abs() > 1e-10 => {
                seasonals.iter_mut().for_each(|s| *s /= centre)
            }
            _ => {}
        }
    }

    /// Initial states for `values` according to the initialisation method
    fn initial_state(&self, values: &[f64]) -> State {
        let heuristic = self.heuristic_state(values);
        if self.initialization == Initialization::Heuristic {
            return heuristic;
        }

        // Refine level and trend against the unsmoothed model
        let frozen = SmoothingParams::new(0.0, 0.0, 0.0);
        let objective = |point: &[f64]| {
            let state = State {
                level: point[0],
                trend: point[1],
                seasonals: heuristic.seasonals.clone(),
            };
            self.smooth(values, state, frozen).1
        };
        let result = nelder_mead(
            objective,
            &[heuristic.level, heuristic.trend],
            None,
            &NelderMeadConfig {
                max_iter: 500,
                ..NelderMeadConfig::default()
            },
        );

        if result.optimal_value.is_finite() && result.optimal_value < f64::MAX {
            State {
                level: result.optimal_point[0],
                trend: result.optimal_point[1],
                seasonals: heuristic.seasonals,
            }
        } else {
            heuristic
        }
    }

    fn project(&self, level: f64, trend: f64, steps: f64) -> f64 {
        match self.trend {
            Component::Additive => level + steps * trend,
            Component::Multiplicative => level * trend.powf(steps),
            Component::None => level,
        }
    }

    fn combine(&self, base: f64, season: f64) -> f64 {
        match self.seasonal {
            Component::Additive => base + season,
            Component::Multiplicative => base * season,
            Component::None => base,
        }
    }

    /// Run the recursions over `values`, returning the final state and SSE
    fn smooth(&self, values: &[f64], mut state: State, params: SmoothingParams) -> (State, f64) {
        let phi = self.phi();
        let m = state.seasonals.len();
        let mut sse = 0.0;

        for (t, &y) in values.iter().enumerate() {
            let idx = t % m;
            let season = state.seasonals[idx];
            let projected = self.project(state.level, state.trend, phi);
            let fitted = self.combine(projected, season);
            sse += (y - fitted).powi(2);

            let deseasonalized = match self.seasonal {
                Component::Additive => y - season,
                Component::Multiplicative => y / season,
                Component::None => y,
            };
            let previous_level = state.level;
            state.level = params.level * deseasonalized + (1.0 - params.level) * projected;

            state.trend = match self.trend {
                Component::Additive => {
                    params.trend * (state.level - previous_level)
                        + (1.0 - params.trend) * phi * state.trend
                }
                Component::Multiplicative => {
                    params.trend * (state.level / previous_level)
                        + (1.0 - params.trend) * state.trend.powf(phi)
                }
                Component::None => 0.0,
            };

            state.seasonals[idx] = match self.seasonal {
                Component::Additive => {
                    params.seasonal * (y - state.level) + (1.0 - params.seasonal) * season
                }
                Component::Multiplicative => {
                    params.seasonal * (y / state.level) + (1.0 - params.seasonal) * season
                }
                Component::None => season,
            };
        }

        (state, sse)
    }

    /// Smooth through `values` with fixed rates
    pub fn train(&self, values: &[f64], params: SmoothingParams) -> Result<TrainedHoltWinters> {
        self.check_data(values)?;
        let initial = self.initial_state(values);
        self.fit_from(values, &initial, params)
    }

    /// Smooth through `values` from given initial states
    fn fit_from(
        &self,
        values: &[f64],
        initial: &State,
        params: SmoothingParams,
    ) -> Result<TrainedHoltWinters> {
        params.validate()?;
        let (state, sse) = self.smooth(values, initial.clone(), params);
        if !sse.is_finite() || !state.level.is_finite() || !state.trend.is_finite() {
            return Err(ewm_error("smoothing recursion diverged"));
        }

        Ok(TrainedHoltWinters {
            model: self.clone(),
            params,
            state,
            n: values.len(),
        })
    }
}

impl TrainedHoltWinters {
    pub fn params(&self) -> SmoothingParams {
        self.params
    }
}

impl TrainedForecastModel for TrainedHoltWinters {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let phi = self.model.phi();
        let m = self.state.seasonals.len();
        let mut damped_steps = 0.0;
        let mut factor = 1.0;

        Ok((1..=horizon)
            .map(|k| {
                factor *= phi;
                damped_steps += factor;
                let base = self
                    .model
                    .project(self.state.level, self.state.trend, damped_steps);
                let season = self.state.seasonals[(self.n + k - 1) % m];
                self.model.combine(base, season)
            })
            .collect())
    }
}

/// Exhaustive search over smoothing rates scored on a held-out tail
struct GridSearch<'a> {
    model: &'a HoltWinters,
    fit_values: Vec<f64>,
    /// Initial states of `fit_values`, shared by every candidate
    initial: State,
    holdout: Vec<f64>,
    trend_open: bool,
    seasonal_open: bool,
}

impl<'a> GridSearch<'a> {
    fn new(model: &'a HoltWinters, train: &Series, horizon: usize) -> Result<Self> {
        let values = train.values();
        let fit_len = values.len().saturating_sub(horizon);
        if horizon == 0 || fit_len < model.min_observations() {
            return Err(ewm_error(format!(
                "smoothing search needs {} observations plus a {}-day hold-out, got {}",
                model.min_observations(),
                horizon,
                values.len()
            )));
        }

        let trend_open = model.trend != Component::None && has_increasing_trend(&values);
        let seasonal_open = model.is_seasonal() && has_monthly_seasonality(train);
        debug!(trend_open, seasonal_open, "holt-winters presence tests");

        let (fit_values, holdout) = values.split_at(fit_len);
        model.check_data(fit_values)?;
        Ok(Self {
            model,
            initial: model.initial_state(fit_values),
            fit_values: fit_values.to_vec(),
            holdout: holdout.to_vec(),
            trend_open,
            seasonal_open,
        })
    }

    /// Candidates in level, trend, seasonal order
    fn candidates(&self) -> Vec<SmoothingParams> {
        let rate = |step: usize| step as f64 / GRID_STEPS as f64;
        let mut candidates = Vec::new();
        for level in 0..=MAX_LEVEL_STEP {
            let trends: Vec<usize> = if self.trend_open {
                (0..level).collect()
            } else {
                vec![0]
            };
            let seasonals: Vec<usize> = if self.seasonal_open {
                (0..GRID_STEPS - level).collect()
            } else {
                vec![0]
            };
            for &trend in &trends {
                for &seasonal in &seasonals {
                    candidates.push(SmoothingParams::new(
                        rate(level),
                        rate(trend),
                        rate(seasonal),
                    ));
                }
            }
        }
        candidates
    }

    fn score(&self, params: SmoothingParams) -> Option<f64> {
        let trained = self
            .model
            .fit_from(&self.fit_values, &self.initial, params)
            .ok()?;
        let forecast = trained.forecast(self.holdout.len()).ok()?;
        let use_mape = self.holdout.iter().all(|a| *a != 0.0);
        let total: f64 = forecast
            .iter()
            .zip(&self.holdout)
            .map(|(f, a)| {
                if use_mape {
                    ((a - f) / a).abs()
                } else {
                    (a - f).abs()
                }
            })
            .sum();
        let score = total / self.holdout.len() as f64;
        score.is_finite().then_some(score)
    }

    fn run(&self) -> Result<SmoothingParams> {
        let candidates = self.candidates();
        let scores: Vec<Option<f64>> = candidates
            .par_iter()
            .map(|params| self.score(*params))
            .collect();

        let mut best: Option<(SmoothingParams, f64)> = None;
        for (params, score) in candidates.iter().zip(scores) {
            let Some(score) = score else { continue };
            match best {
                Some((_, best_score)) if score >= best_score => {}
                _ => best = Some((*params, score)),
            }
        }

        let (params, score) = best.ok_or_else(|| ewm_error("no smoothing candidate could be fitted"))?;
        debug!(
            candidates = candidates.len(),
            score,
            level = params.level,
            trend = params.trend,
            seasonal = params.seasonal,
            "smoothing grid search finished"
        );
        Ok(params)
    }
}

/// Mann-Kendall reports a significant upward trend
fn has_increasing_trend(values: &[f64]) -> bool {
    mann_kendall(values, PRESENCE_ALPHA)
        .map(|result| result.is_increasing())
        .unwrap_or(false)
}

/// Kruskal-Wallis finds occupancy differs between calendar months
fn has_monthly_seasonality(series: &Series) -> bool {
    let mut groups = vec![Vec::new(); 12];
    for observation in series.observations() {
        groups[observation.date.month0() as usize].push(f64::from(observation.occupancy));
    }
    kruskal_wallis(&groups)
        .map(|result| result.rejects_equality(PRESENCE_ALPHA))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn weekly_series(days: usize) -> Series {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let occupancy = (0..days)
            .map(|i| if i % 7 >= 5 { 120 } else { 100 })
            .collect();
        Series::from_start(start, occupancy).unwrap()
    }

    fn config() -> ExponentialSmoothingConfig {
        ExponentialSmoothingConfig::default()
    }

    #[test]
    fn test_explicit_rates_skip_search() {
        let mut config = config();
        config.smoothing_level = Some(0.4);
        config.smoothing_seasonal = Some(0.1);
        let params = ExponentialSmoothingAdapter
            .select_smoothing(&weekly_series(10), 30, &config)
            .unwrap();
        assert_eq!(params, SmoothingParams::new(0.4, 0.0, 0.1));
    }

    #[test]
    fn test_rates_out_of_range_fail() {
        let mut config = config();
        config.smoothing_level = Some(1.5);
        let result = ExponentialSmoothingAdapter.select_smoothing(&weekly_series(60), 7, &config);
        assert!(matches!(result, Err(ForecastError::ModelFit { .. })));
    }

    #[test]
    fn test_pure_weekly_pattern_is_reproduced() {
        let values = weekly_series(70).values();
        let model = HoltWinters::from_config(&config()).unwrap();
        let trained = model
            .train(&values, SmoothingParams::new(0.2, 0.0, 0.1))
            .unwrap();
        let forecast = trained.forecast(14).unwrap();
        for (k, value) in forecast.iter().enumerate() {
            let expected = if (70 + k) % 7 >= 5 { 120.0 } else { 100.0 };
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_damped_trend_flattens() {
        let mut config = config();
        config.seasonal = Component::None;
        config.damped_trend = true;
        config.damping_trend = 0.5;
        let values: Vec<f64> = (0..40).map(|i| 10.0 + i as f64).collect();
        let trained = HoltWinters::from_config(&config)
            .unwrap()
            .train(&values, SmoothingParams::new(0.5, 0.5, 0.0))
            .unwrap();
        let forecast = trained.forecast(30).unwrap();
        let last_step = forecast[29] - forecast[28];
        assert!(last_step.abs() < 1e-6);
        assert!(forecast[0] > 48.0);
        assert!(forecast[29] < 50.0);
    }

    #[test]
    fn test_oversized_period_is_a_fit_error() {
        let mut config = config();
        config.seasonal_periods = 1usize << (usize::BITS - 1);
        assert!(matches!(
            HoltWinters::from_config(&config),
            Err(ForecastError::ModelFit { .. })
        ));

        // the period is ignored without a seasonal component
        config.seasonal = Component::None;
        let model = HoltWinters::from_config(&config).unwrap();
        assert_eq!(model.min_observations(), 2);
    }

    #[test]
    fn test_estimated_initialisation_lowers_in_sample_error() {
        // ramp plus weekend bump plus a five-day wobble
        let values: Vec<f64> = (0..56)
            .map(|t| {
                let weekend = if t % 7 >= 5 { 20.0 } else { 0.0 };
                50.0 + 0.8 * t as f64 + weekend + ((t * 7) % 5) as f64
            })
            .collect();
        let heuristic = HoltWinters::from_config(&config()).unwrap();
        let estimated = HoltWinters::from_config(&ExponentialSmoothingConfig {
            initialization_method: Initialization::Estimated,
            ..config()
        })
        .unwrap();

        let frozen = SmoothingParams::new(0.0, 0.0, 0.0);
        let start = heuristic.initial_state(&values);
        let refined = estimated.initial_state(&values);
        assert_eq!(refined.seasonals, start.seasonals);

        let (_, heuristic_sse) = heuristic.smooth(&values, start, frozen);
        let (_, estimated_sse) = estimated.smooth(&values, refined, frozen);
        assert!(
            estimated_sse < heuristic_sse,
            "estimated {} vs heuristic {}",
            estimated_sse,
            heuristic_sse
        );

        let trained = estimated
            .train(&values, SmoothingParams::new(0.3, 0.1, 0.1))
            .unwrap();
        let forecast = trained.forecast(7).unwrap();
        assert_eq!(forecast.len(), 7);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_multiplicative_trend_and_season() {
        let truth = |t: usize| {
            let season = if t % 7 >= 5 { 1.2 } else { 1.0 };
            100.0 * 1.005f64.powi(t as i32) * season
        };
        let values: Vec<f64> = (0..140).map(truth).collect();
        let model = HoltWinters::from_config(&ExponentialSmoothingConfig {
            trend: Component::Multiplicative,
            seasonal: Component::Multiplicative,
            ..config()
        })
        .unwrap();

        let trained = model
            .train(&values, SmoothingParams::new(0.3, 0.1, 0.1))
            .unwrap();
        let forecast = trained.forecast(14).unwrap();
        for (k, value) in forecast.iter().enumerate() {
            let expected = truth(140 + k);
            assert!(
                ((value - expected) / expected).abs() < 0.05,
                "step {}: {} vs {}",
                k,
                value,
                expected
            );
        }
        // 140 is a multiple of 7, so steps 5 and 6 fall on the weekend
        assert!(forecast[5] > forecast[4] * 1.1);
        assert!(forecast[6] > forecast[7] * 1.1);
    }

    #[test]
    fn test_multiplicative_requires_positive_data() {
        let mut config = config();
        config.seasonal = Component::Multiplicative;
        let model = HoltWinters::from_config(&config).unwrap();
        let mut values = weekly_series(28).values();
        values[3] = 0.0;
        assert!(matches!(
            model.check_data(&values),
            Err(ForecastError::ModelFit { .. })
        ));
    }

    #[test]
    fn test_short_series_fails() {
        let result = ExponentialSmoothingAdapter.fit_and_predict(
            &weekly_series(10),
            3,
            &ModelConfig::ExponentialSmoothing(config()),
        );
        assert!(matches!(result, Err(ForecastError::ModelFit { .. })));
    }

    #[test]
    fn test_grid_collapses_without_trend_or_seasonality() {
        let series = weekly_series(140);
        let model = HoltWinters::from_config(&config()).unwrap();
        let search = GridSearch::new(&model, &series, 14).unwrap();
        assert!(!search.trend_open);
        assert!(!search.seasonal_open);
        let candidates = search.candidates();
        assert_eq!(candidates.len(), MAX_LEVEL_STEP + 1);
        assert_eq!(candidates[0], SmoothingParams::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_grid_search_is_deterministic() {
        let series = weekly_series(140);
        let first = ExponentialSmoothingAdapter
            .select_smoothing(&series, 14, &config())
            .unwrap();
        let second = ExponentialSmoothingAdapter
            .select_smoothing(&series, 14, &config())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.trend, 0.0);
        assert_eq!(first.seasonal, 0.0);
    }

    #[test]
    fn test_open_grid_respects_rate_bounds() {
        let model = HoltWinters::from_config(&config()).unwrap();
        let fit_values = vec![1.0; 14];
        let search = GridSearch {
            model: &model,
            initial: model.initial_state(&fit_values),
            fit_values,
            holdout: vec![1.0; 7],
            trend_open: true,
            seasonal_open: true,
        };
        let candidates = search.candidates();
        assert!(candidates.iter().all(|c| c.trend < c.level));
        assert!(candidates.iter().all(|c| c.seasonal < 1.0 - c.level + 1e-9));
        assert!(candidates.iter().all(|c| c.level <= 0.97 + 1e-9));
    }
}
