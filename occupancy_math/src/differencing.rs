//! Lag differencing and its inverse

use crate::{MathError, Result};

/// Difference `values` at `lag`: `out[t] = values[t + lag] - values[t]`.
pub fn difference(values: &[f64], lag: usize) -> Result<Vec<f64>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Differencing lag must be positive".to_string(),
        ));
    }
    if values.len() <= lag {
        return Err(MathError::InsufficientData(format!(
            "Differencing at lag {} needs more than {} observations, got {}",
            lag,
            lag,
            values.len()
        )));
    }

    Ok(values
        .iter()
        .skip(lag)
        .zip(values.iter())
        .map(|(later, earlier)| later - earlier)
        .collect())
}

/// Undo one round of lag differencing for values beyond the end of `history`.
///
/// `history` is the undifferenced series the increments continue from;
/// the returned vector has one level per increment.
pub fn integrate(history: &[f64], increments: &[f64], lag: usize) -> Result<Vec<f64>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Integration lag must be positive".to_string(),
        ));
    }
    if history.len() < lag {
        return Err(MathError::InsufficientData(format!(
            "Integration at lag {} needs at least {} historical values, got {}",
            lag,
            lag,
            history.len()
        )));
    }

    let mut extended = history[history.len() - lag..].to_vec();
    for &inc in increments {
        let base = extended[extended.len() - lag];
        extended.push(base + inc);
    }
    Ok(extended.split_off(lag))
}
