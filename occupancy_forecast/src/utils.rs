//! Utility functions for the occupancy_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};

/// `count` consecutive calendar days starting at `start` (inclusive)
pub fn consecutive_dates(start: NaiveDate, count: usize) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::with_capacity(count);
    let mut current = start;
    for i in 0..count {
        if i > 0 {
            current = current.succ_opt().ok_or_else(|| {
                ForecastError::DataError(format!("Date overflow after {}", current))
            })?;
        }
        dates.push(current);
    }
    Ok(dates)
}

/// The `horizon` days immediately following `last_date`
pub fn future_dates(last_date: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    if horizon == 0 {
        return Ok(Vec::new());
    }
    let first = last_date.succ_opt().ok_or_else(|| {
        ForecastError::DataError(format!("Date overflow after {}", last_date))
    })?;
    consecutive_dates(first, horizon)
}

/// Calendar features used by the tree ensemble:
/// day of year, day of week (Monday = 0), month, year.
pub fn calendar_features(date: NaiveDate) -> [f64; 4] {
    [
        f64::from(date.ordinal()),
        f64::from(date.weekday().num_days_from_monday()),
        f64::from(date.month()),
        f64::from(date.year()),
    ]
}

/// Round a raw model output to a bed count: half away from zero, negatives clamp to 0.
pub fn to_bed_count(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if rounded <= 0.0 {
        Some(0)
    } else if rounded >= f64::from(u32::MAX) {
        Some(u32::MAX)
    } else {
        Some(rounded as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_dates_cross_year_boundary() {
        let last = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
        let dates = future_dates(last, 3).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ]
        );
        assert!(future_dates(last, 0).unwrap().is_empty());
    }

    #[test]
    fn test_calendar_features() {
        // 2024-03-04 is a Monday, 64th day of a leap year
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(calendar_features(date), [64.0, 0.0, 3.0, 2024.0]);
    }

    #[test]
    fn test_to_bed_count() {
        assert_eq!(to_bed_count(12.5), Some(13));
        assert_eq!(to_bed_count(12.49), Some(12));
        assert_eq!(to_bed_count(-3.2), Some(0));
        assert_eq!(to_bed_count(f64::NAN), None);
        assert_eq!(to_bed_count(f64::INFINITY), None);
    }
}
