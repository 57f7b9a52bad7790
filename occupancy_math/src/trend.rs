//! Mann-Kendall test for a monotonic trend.
//!
//! The test statistic `S` counts concordant minus discordant pairs. Its
//! variance is corrected for tied values, and the two-sided p-value comes
//! from the standard normal approximation.

use crate::{MathError, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// Direction reported by the trend test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    /// Significant upward trend
    Increasing,
    /// Significant downward trend
    Decreasing,
    /// No significant trend at the chosen level
    NoTrend,
}

/// Outcome of a Mann-Kendall test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MannKendallResult {
    /// Sum of signs over all ordered pairs
    pub s: f64,
    /// Tie-corrected variance of `s`
    pub variance: f64,
    /// Continuity-corrected normal score
    pub z: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Trend direction at the requested significance level
    pub direction: TrendDirection,
}

impl MannKendallResult {
    /// True when the test found a significant upward trend
    pub fn is_increasing(&self) -> bool {
        self.direction == TrendDirection::Increasing
    }
}

/// Run the original (non-seasonal) Mann-Kendall test.
///
/// `alpha` is the two-sided significance level, typically 0.05.
pub fn mann_kendall(values: &[f64], alpha: f64) -> Result<MannKendallResult> {
    if values.len() < 3 {
        return Err(MathError::InsufficientData(format!(
            "Mann-Kendall needs at least 3 observations, got {}",
            values.len()
        )));
    }
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(MathError::InvalidInput(
            "Significance level must be between 0 and 1".to_string(),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Mann-Kendall input contains non-finite values".to_string(),
        ));
    }

    let n = values.len();
    let mut s = 0.0;
    for i in 0..n - 1 {
        for j in i + 1..n {
            let diff = values[j] - values[i];
            if diff > 0.0 {
                s += 1.0;
            } else if diff < 0.0 {
                s -= 1.0;
            }
        }
    }

    let n_f = n as f64;
    let tie_term: f64 = tie_groups(values)
        .into_iter()
        .map(|t| {
            let t = t as f64;
            t * (t - 1.0) * (2.0 * t + 5.0)
        })
        .sum();
    let variance = (n_f * (n_f - 1.0) * (2.0 * n_f + 5.0) - tie_term) / 18.0;

    let z = if variance <= 0.0 {
        0.0
    } else if s > 0.0 {
        (s - 1.0) / variance.sqrt()
    } else if s < 0.0 {
        (s + 1.0) / variance.sqrt()
    } else {
        0.0
    };

    let normal =
        Normal::new(0.0, 1.0).map_err(|e| MathError::CalculationError(e.to_string()))?;
    let p_value = 2.0 * (1.0 - normal.cdf(z.abs()));

    let direction = if p_value < alpha && z > 0.0 {
        TrendDirection::Increasing
    } else if p_value < alpha && z < 0.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::NoTrend
    };

    Ok(MannKendallResult {
        s,
        variance,
        z,
        p_value,
        direction,
    })
}

/// Sizes of groups of tied values (only groups larger than one).
fn tie_groups(values: &[f64]) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut groups = Vec::new();
    let mut run = 1;
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
        } else {
            if run > 1 {
                groups.push(run);
            }
            run = 1;
        }
    }
    if run > 1 {
        groups.push(run);
    }
    groups
}
