//! Seasonal ARIMA fitted by conditional sum of squares

use crate::config::{AutoregressiveConfig, ModelConfig, ModelKind};
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::models::{config_mismatch, ForecastModel, Prediction, TrainedForecastModel};
use occupancy_math::differencing::{difference, integrate};
use occupancy_math::polynomial::{lag_polynomial, multiply};
use occupancy_math::{mean, nelder_mead, NelderMeadConfig};
use tracing::debug;

const COEFFICIENT_BOUND: f64 = 0.99;
const MIN_EXTRA_OBSERVATIONS: usize = 10;

/// Adapter for the seasonal autoregressive family
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoregressiveAdapter;

impl ForecastModel for AutoregressiveAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::Autoregressive
    }

    fn fit_and_predict(
        &self,
        train: &Series,
        horizon: usize,
        config: &ModelConfig,
    ) -> Result<Prediction> {
        let config = match config {
            ModelConfig::Autoregressive(config) => config,
            other => return Err(config_mismatch(self.kind(), other)),
        };

        let trained = SarimaModel::new(config)?.train(&train.values())?;
        let forecast = trained.forecast(horizon)?;
        Prediction::from_forecast(self.kind(), train.last_date(), &forecast)
    }
}

/// SARIMA(p,d,q)(P,D,Q)m specification
#[derive(Debug, Clone)]
pub struct SarimaModel {
    /// Name of the model
    name: String,
    p: usize,
    d: usize,
    q: usize,
    seasonal_p: usize,
    seasonal_d: usize,
    seasonal_q: usize,
    period: usize,
    max_iterations: usize,
    /// Degree of the expanded AR polynomial
    ar_degree: usize,
    /// Degree of the expanded MA polynomial
    ma_degree: usize,
}

/// SARIMA with estimated coefficients and the state needed to forecast
#[derive(Debug, Clone)]
pub struct TrainedSarimaModel {
    name: String,
    /// Expanded AR polynomial, index 0 is 1
    ar_polynomial: Vec<f64>,
    /// Expanded MA polynomial, index 0 is 1
    ma_polynomial: Vec<f64>,
    /// Mean removed from the differenced series
    mean: f64,
    /// Centred differenced series
    centred: Vec<f64>,
    /// In-sample one-step residuals of `centred`
    residuals: Vec<f64>,
    /// Series before each differencing round with the lag used
    levels: Vec<(Vec<f64>, usize)>,
    /// Mean squared conditional residual at the optimum
    sigma2: f64,
}

impl SarimaModel {
    /// Validate the orders of `config`
    pub fn new(config: &AutoregressiveConfig) -> Result<Self> {
        let (p, d, q) = config.order;
        let (seasonal_p, seasonal_d, seasonal_q, period) = config.seasonal_order;
        let name = format!(
            "SARIMA({},{},{})({},{},{},{})",
            p, d, q, seasonal_p, seasonal_d, seasonal_q, period
        );

        let has_seasonal_terms = [seasonal_p, seasonal_d, seasonal_q].iter().any(|&o| o > 0);
        if has_seasonal_terms && period < 2 {
            return Err(ForecastError::model_fit(
                ModelKind::Autoregressive.name(),
                format!("{} needs a seasonal period of at least 2", name),
            ));
        }
        if config.max_iterations == 0 {
            return Err(ForecastError::model_fit(
                ModelKind::Autoregressive.name(),
                "max_iterations must be positive",
            ));
        }

        let degree = |plain: usize, seasonal: usize| {
            seasonal
                .checked_mul(period)
                .and_then(|lags| lags.checked_add(plain))
        };
        let fits = |ar: usize, ma: usize| {
            ar.checked_add(ma)
                .and_then(|total| total.checked_add(MIN_EXTRA_OBSERVATIONS))
                .is_some()
        };
        let degrees = degree(p, seasonal_p)
            .zip(degree(q, seasonal_q))
            .filter(|&(ar, ma)| fits(ar, ma));
        let Some((ar_degree, ma_degree)) = degrees else {
            return Err(ForecastError::model_fit(
                ModelKind::Autoregressive.name(),
                format!("{} has lag polynomials too large to represent", name),
            ));
        };

        Ok(Self {
            name,
            p,
            d,
            q,
            seasonal_p,
            seasonal_d,
            seasonal_q,
            period,
            max_iterations: config.max_iterations,
            ar_degree,
            ma_degree,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn fit_error(&self, reason: impl Into<String>) -> ForecastError {
        ForecastError::model_fit(
            ModelKind::Autoregressive.name(),
            format!("{}: {}", self.name, reason.into()),
        )
    }

    /// Split a flat parameter vector into the four coefficient groups
    fn unpack<'a>(&self, params: &'a [f64]) -> (&'a [f64], &'a [f64], &'a [f64], &'a [f64]) {
        let (ar, rest) = params.split_at(self.p);
        let (seasonal_ar, rest) = rest.split_at(self.seasonal_p);
        let (ma, seasonal_ma) = rest.split_at(self.q);
        (ar, seasonal_ar, ma, seasonal_ma)
    }

    fn polynomials(&self, params: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let (ar, seasonal_ar, ma, seasonal_ma) = self.unpack(params);
        let ar_polynomial = multiply(
            &lag_polynomial(ar, 1, -1.0),
            &lag_polynomial(seasonal_ar, self.period.max(1), -1.0),
        );
        let ma_polynomial = multiply(
            &lag_polynomial(ma, 1, 1.0),
            &lag_polynomial(seasonal_ma, self.period.max(1), 1.0),
        );
        (ar_polynomial, ma_polynomial)
    }

    /// Fit the model to `values`
    pub fn train(&self, values: &[f64]) -> Result<TrainedSarimaModel> {
        let mut levels = Vec::new();
        let mut working = values.to_vec();
        let lags = std::iter::repeat(1)
            .take(self.d)
            .chain(std::iter::repeat(self.period).take(self.seasonal_d));
        for lag in lags {
            let next = difference(&working, lag).map_err(|e| self.fit_error(e.to_string()))?;
            levels.push((std::mem::replace(&mut working, next), lag));
        }

        let required = self.ar_degree + self.ma_degree + MIN_EXTRA_OBSERVATIONS;
        if working.len() < required {
            return Err(self.fit_error(format!(
                "needs at least {} observations after differencing, got {}",
                required,
                working.len()
            )));
        }

        let centre = mean(&working).unwrap_or(0.0);
        let centred: Vec<f64> = working.iter().map(|v| v - centre).collect();

        let n_params = self.p + self.seasonal_p + self.q + self.seasonal_q;
        let initial = vec![0.1; n_params];
        let bounds = vec![(-COEFFICIENT_BOUND, COEFFICIENT_BOUND); n_params];
        let optimizer = NelderMeadConfig {
            max_iter: self.max_iterations,
            ..NelderMeadConfig::default()
        };

        let result = nelder_mead(
            |params| {
                let (ar, ma) = self.polynomials(params);
                conditional_sum_of_squares(&centred, &ar, &ma)
            },
            &initial,
            Some(&bounds),
            &optimizer,
        );

        let (ar_polynomial, ma_polynomial) = self.polynomials(&result.optimal_point);
        let residuals = conditional_residuals(&centred, &ar_polynomial, &ma_polynomial);
        let scored = residuals.len().saturating_sub(ar_polynomial.len() - 1).max(1);
        let sigma2 = conditional_sum_of_squares(&centred, &ar_polynomial, &ma_polynomial)
            / scored as f64;
        if !sigma2.is_finite() {
            return Err(self.fit_error("conditional sum of squares diverged"));
        }

        debug!(
            model = %self.name,
            iterations = result.iterations,
            converged = result.converged,
            sigma2,
            "fitted seasonal ARIMA"
        );

        Ok(TrainedSarimaModel {
            name: self.name.clone(),
            ar_polynomial,
            ma_polynomial,
            mean: centre,
            centred,
            residuals,
            levels,
            sigma2,
        })
    }
}

/// One-step residuals with pre-sample residuals and values set to zero
fn conditional_residuals(centred: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut residuals = vec![0.0; centred.len()];
    for t in 0..centred.len() {
        let mut e = centred[t];
        for (i, c) in ar.iter().enumerate().skip(1) {
            if i > t {
                break;
            }
            e += c * centred[t - i];
        }
        for (j, m) in ma.iter().enumerate().skip(1) {
            if j > t {
                break;
            }
            e -= m * residuals[t - j];
        }
        residuals[t] = e;
    }
    residuals
}

/// Sum of squared residuals once the AR recursion has a full history
fn conditional_sum_of_squares(centred: &[f64], ar: &[f64], ma: &[f64]) -> f64 {
    let start = ar.len() - 1;
    let residuals = conditional_residuals(centred, ar, ma);
    residuals.iter().skip(start).map(|e| e * e).sum()
}

impl TrainedSarimaModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Innovation variance estimate
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }
}

impl TrainedForecastModel for TrainedSarimaModel {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let mut values = self.centred.clone();
        let mut shocks = self.residuals.clone();

        for _ in 0..horizon {
            let t = values.len();
            let mut next = 0.0;
            for (i, c) in self.ar_polynomial.iter().enumerate().skip(1) {
                if i <= t {
                    next -= c * values[t - i];
                }
            }
            for (j, m) in self.ma_polynomial.iter().enumerate().skip(1) {
                if j <= t {
                    next += m * shocks[t - j];
                }
            }
            values.push(next);
            shocks.push(0.0);
        }

        let mut future: Vec<f64> = values
            .split_off(self.centred.len())
            .into_iter()
            .map(|v| v + self.mean)
            .collect();

        for (history, lag) in self.levels.iter().rev() {
            future = integrate(history, &future, *lag)?;
        }

        Ok(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn weekly_pattern(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + if i % 7 >= 5 { 20.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn test_rejects_seasonal_terms_without_period() {
        let config = AutoregressiveConfig {
            seasonal_order: (1, 0, 0, 1),
            ..Default::default()
        };
        assert!(matches!(
            SarimaModel::new(&config),
            Err(ForecastError::ModelFit { .. })
        ));
    }

    #[test]
    fn test_rejects_orders_that_overflow() {
        let huge = 1usize << (usize::BITS - 1);
        for config in [
            AutoregressiveConfig {
                seasonal_order: (2, 0, 0, huge),
                ..Default::default()
            },
            AutoregressiveConfig {
                order: (usize::MAX, 0, 0),
                seasonal_order: (0, 0, 0, 0),
                ..Default::default()
            },
            AutoregressiveConfig {
                seasonal_order: (huge, huge, huge, 7),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                SarimaModel::new(&config),
                Err(ForecastError::ModelFit { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_short_series() {
        let model = SarimaModel::new(&AutoregressiveConfig::default()).unwrap();
        // default degrees: ar 2 + 7, ma 14, plus 10
        let result = model.train(&weekly_pattern(30));
        assert!(matches!(result, Err(ForecastError::ModelFit { .. })));
    }

    #[test]
    fn test_seasonal_difference_repeats_pattern() {
        let config = AutoregressiveConfig {
            order: (0, 0, 0),
            seasonal_order: (0, 1, 0, 7),
            max_iterations: 10,
        };
        let values = weekly_pattern(70);
        let trained = SarimaModel::new(&config).unwrap().train(&values).unwrap();
        let forecast = trained.forecast(14).unwrap();
        for (i, value) in forecast.iter().enumerate() {
            assert_abs_diff_eq!(*value, values[70 - 7 + i % 7], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_ar1_recovers_coefficient_sign() {
        // x_t = 0.6 x_{t-1} + deterministic wiggle
        let mut values = vec![0.0; 200];
        for t in 1..values.len() {
            let shock = ((t * 37) % 11) as f64 - 5.0;
            values[t] = 0.6 * values[t - 1] + shock;
        }
        let config = AutoregressiveConfig {
            order: (1, 0, 0),
            seasonal_order: (0, 0, 0, 0),
            max_iterations: 500,
        };
        let trained = SarimaModel::new(&config).unwrap().train(&values).unwrap();
        assert!(trained.ar_polynomial[1] < 0.0);
        assert!(trained.sigma2() > 0.0);
    }

    #[test]
    fn test_adapter_produces_horizon_days() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let occupancy: Vec<u32> = weekly_pattern(120).iter().map(|v| *v as u32).collect();
        let series = Series::from_start(start, occupancy).unwrap();
        let prediction = AutoregressiveAdapter
            .fit_and_predict(
                &series,
                10,
                &ModelConfig::Autoregressive(AutoregressiveConfig::default()),
            )
            .unwrap();
        assert_eq!(prediction.len(), 10);
        assert_eq!(prediction.dates()[0], series.last_date().succ_opt().unwrap());
    }

    #[test]
    fn test_adapter_rejects_foreign_config() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let series = Series::from_start(start, vec![1; 60]).unwrap();
        let result = AutoregressiveAdapter.fit_and_predict(
            &series,
            5,
            &ModelConfig::default_for(ModelKind::TreeEnsemble),
        );
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }
}
