//! Descriptive weekday and month occupancy profiles

use crate::data::Series;
use chrono::Datelike;
use serde::Serialize;

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Mean occupancy of one calendar bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileBucket {
    pub label: &'static str,
    pub mean: f64,
    /// Observations in the bucket
    pub days: usize,
}

fn profile<const N: usize>(
    series: &Series,
    labels: [&'static str; N],
    bucket: impl Fn(chrono::NaiveDate) -> usize,
) -> Vec<ProfileBucket> {
    let mut sums = [0.0; N];
    let mut counts = [0usize; N];
    for observation in series.observations() {
        let i = bucket(observation.date);
        sums[i] += f64::from(observation.occupancy);
        counts[i] += 1;
    }

    labels
        .into_iter()
        .zip(sums.into_iter().zip(counts))
        .filter(|(_, (_, days))| *days > 0)
        .map(|(label, (sum, days))| ProfileBucket {
            label,
            mean: sum / days as f64,
            days,
        })
        .collect()
}

/// Mean occupancy per weekday, Monday first; weekdays without data are left out
pub fn weekday_profile(series: &Series) -> Vec<ProfileBucket> {
    profile(series, WEEKDAYS, |d| {
        d.weekday().num_days_from_monday() as usize
    })
}

/// Mean occupancy per calendar month, January first; months without data are left out
pub fn monthly_profile(series: &Series) -> Vec<ProfileBucket> {
    profile(series, MONTHS, |d| d.month0() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_weekday_profile() {
        // two weeks starting on a Monday, weekends busier
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let occupancy = (0..14).map(|i| if i % 7 >= 5 { 120 } else { 100 }).collect();
        let series = Series::from_start(start, occupancy).unwrap();

        let profile = weekday_profile(&series);
        assert_eq!(profile.len(), 7);
        assert_eq!(profile[0].label, "Monday");
        assert_eq!(profile[0].mean, 100.0);
        assert_eq!(profile[6].mean, 120.0);
        assert_eq!(profile[6].days, 2);
    }

    #[test]
    fn test_monthly_profile_skips_empty_months() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let series = Series::from_start(start, vec![10, 20, 30, 50]).unwrap();

        let profile = monthly_profile(&series);
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].label, "January");
        assert_eq!(profile[0].mean, 15.0);
        assert_eq!(profile[1].label, "February");
        assert_eq!(profile[1].mean, 40.0);
    }
}
