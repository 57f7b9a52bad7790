//! Train/test partitioning for the three run modes

use crate::config::RunMode;
use crate::data::Series;
use crate::error::{ForecastError, Result};

/// Number of rolling-origin splits in accurate mode
pub const ROLLING_SPLITS: usize = 3;

/// One train/test partition. `test` directly follows `train`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Series,
    pub test: Series,
}

/// Partition `series` for `mode`.
///
/// `test` and `forecast` give one split whose test window is the last
/// `horizon` days. `accurate` gives [`ROLLING_SPLITS`] walk-forward splits
/// with adjacent, non-overlapping test windows ending at the last day.
/// Every training partition holds at least `horizon` days.
pub fn split(series: &Series, horizon: usize, mode: RunMode) -> Result<Vec<Split>> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Horizon must be a positive number of days".to_string(),
        ));
    }

    let windows = match mode {
        RunMode::Test | RunMode::Forecast => 1,
        RunMode::Accurate => ROLLING_SPLITS,
    };
    let required = horizon.saturating_mul(windows + 1);
    let n = series.len();
    if n < required {
        return Err(ForecastError::InsufficientData(format!(
            "{} mode with a {}-day horizon needs at least {} days, got {}",
            mode, horizon, required, n
        )));
    }

    (0..windows)
        .map(|i| {
            let test_start = n - (windows - i) * horizon;
            Ok(Split {
                train: series.head(test_start)?,
                test: series.slice(test_start, test_start + horizon)?,
            })
        })
        .collect()
}
