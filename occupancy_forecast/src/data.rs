//! Occupancy series handling and CSV ingestion

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::{CsvReader, DataFrame, DataType, SerReader};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// One day of bed occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar day
    pub date: NaiveDate,
    /// Occupied beds on that day
    pub occupancy: u32,
}

/// Regularly spaced daily occupancy history.
///
/// A `Series` is never empty and its dates advance by exactly one day from
/// each observation to the next. Construction rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    /// Create a series from parallel date and occupancy columns
    pub fn new(dates: Vec<NaiveDate>, occupancy: Vec<u32>) -> Result<Self> {
        if dates.len() != occupancy.len() {
            return Err(ForecastError::DataError(format!(
                "Dates length ({}) doesn't match occupancy length ({})",
                dates.len(),
                occupancy.len()
            )));
        }

        let observations = dates
            .into_iter()
            .zip(occupancy)
            .map(|(date, occupancy)| Observation { date, occupancy })
            .collect();
        Self::from_observations(observations)
    }

    /// Create a series of consecutive days starting at `start`
    pub fn from_start(start: NaiveDate, occupancy: Vec<u32>) -> Result<Self> {
        let dates = crate::utils::consecutive_dates(start, occupancy.len())?;
        Self::new(dates, occupancy)
    }

    /// Create a series from observations, validating the daily spacing
    pub fn from_observations(observations: Vec<Observation>) -> Result<Self> {
        if observations.is_empty() {
            return Err(ForecastError::DataError(
                "Occupancy series must not be empty".to_string(),
            ));
        }

        for pair in observations.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if prev.succ_opt() != Some(next) {
                let reason = if next == prev {
                    "duplicate date"
                } else if next < prev {
                    "dates not increasing"
                } else {
                    "calendar gap"
                };
                return Err(ForecastError::DataError(format!(
                    "{} between {} and {}",
                    reason, prev, next
                )));
            }
        }

        Ok(Self { observations })
    }

    /// Number of days in the series
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// All observations in date order
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// First day of the series
    pub fn first_date(&self) -> NaiveDate {
        self.observations[0].date
    }

    /// Last day of the series
    pub fn last_date(&self) -> NaiveDate {
        self.observations[self.observations.len() - 1].date
    }

    /// Dates in order
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    /// Occupancy counts in date order
    pub fn occupancy(&self) -> Vec<u32> {
        self.observations.iter().map(|o| o.occupancy).collect()
    }

    /// Occupancy as floating point values, the form the models work on
    pub fn values(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(|o| f64::from(o.occupancy))
            .collect()
    }

    /// Sub-series covering positions `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.len() {
            return Err(ForecastError::DataError(format!(
                "Invalid slice {}..{} of a series with {} observations",
                start,
                end,
                self.len()
            )));
        }

        Ok(Self {
            observations: self.observations[start..end].to_vec(),
        })
    }

    /// First `n` observations
    pub fn head(&self, n: usize) -> Result<Self> {
        self.slice(0, n)
    }

    /// Last `n` observations
    pub fn tail(&self, n: usize) -> Result<Self> {
        let start = self.len().checked_sub(n).ok_or_else(|| {
            ForecastError::DataError(format!(
                "Cannot take the last {} of {} observations",
                n,
                self.len()
            ))
        })?;
        self.slice(start, self.len())
    }
}

/// Data loader for occupancy CSV files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load an occupancy series from a CSV file with `date` and `occupancy` columns
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Series> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(Some(100))
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Extract an occupancy series from an existing DataFrame.
    ///
    /// Columns other than the date and occupancy columns are ignored.
    pub fn from_dataframe(df: DataFrame) -> Result<Series> {
        let date_column = Self::detect_date_column(&df)?;

        let dates = df.column(&date_column)?.cast(&DataType::Utf8)?;
        let dates = dates
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value
                    .ok_or_else(|| {
                        ForecastError::DataError(format!("Missing date in row {}", row + 1))
                    })
                    .and_then(|raw| parse_date(raw, row))
            })
            .collect::<Result<Vec<NaiveDate>>>()?;

        let occupancy = df
            .column("occupancy")
            .map_err(|_| {
                ForecastError::DataError("No 'occupancy' column found in data".to_string())
            })?
            .cast(&DataType::Float64)?;
        let occupancy = occupancy
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
                    Ok(v as u32)
                }
                Some(v) => Err(ForecastError::DataError(format!(
                    "Occupancy in row {} must be a non-negative integer, got {}",
                    row + 1,
                    v
                ))),
                None => Err(ForecastError::DataError(format!(
                    "Missing or unparseable occupancy in row {}",
                    row + 1
                ))),
            })
            .collect::<Result<Vec<u32>>>()?;

        Series::new(dates, occupancy)
    }

    /// Find the date column, accepting the legacy `dates` spelling
    fn detect_date_column(df: &DataFrame) -> Result<String> {
        let column_names = df.get_column_names();
        for candidate in ["date", "dates"] {
            if column_names.iter().any(|name| *name == candidate) {
                return Ok(candidate.to_string());
            }
        }

        Err(ForecastError::DataError(
            "No 'date' column found in data".to_string(),
        ))
    }
}

/// Parse an ISO calendar date, ignoring a trailing time part
fn parse_date(raw: &str, row: usize) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let day_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").map_err(|e| {
        ForecastError::DataError(format!(
            "Unparseable date '{}' in row {}: {}",
            raw,
            row + 1,
            e
        ))
    })
}
