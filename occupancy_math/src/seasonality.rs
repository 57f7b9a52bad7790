//! Kruskal-Wallis H test.
//!
//! Used to decide whether occupancy differs between calendar groups (months).
//! A small p-value means at least one group is drawn from a different
//! distribution, i.e. the series is seasonal.

use crate::{MathError, Result};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Outcome of a Kruskal-Wallis test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KruskalWallisResult {
    /// Tie-corrected H statistic
    pub statistic: f64,
    /// Upper-tail chi-squared p-value with `groups - 1` degrees of freedom
    pub p_value: f64,
    /// Number of non-empty groups that took part in the test
    pub groups: usize,
}

impl KruskalWallisResult {
    /// True when the null hypothesis of equal distributions is rejected
    pub fn rejects_equality(&self, alpha: f64) -> bool {
        self.p_value <= alpha
    }
}

/// Average ranks (1-based) of `values`, ties receive the mean of their ranks.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share the average of ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Run the Kruskal-Wallis H test over the given groups.
///
/// Empty groups are skipped. At least two non-empty groups are required.
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> Result<KruskalWallisResult> {
    let groups: Vec<&Vec<f64>> = groups.iter().filter(|g| !g.is_empty()).collect();
    if groups.len() < 2 {
        return Err(MathError::InsufficientData(
            "Kruskal-Wallis needs at least two non-empty groups".to_string(),
        ));
    }

    let pooled: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    if pooled.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Kruskal-Wallis input contains non-finite values".to_string(),
        ));
    }

    let ranks = average_ranks(&pooled);
    let total = pooled.len() as f64;

    let mut offset = 0;
    let mut rank_term = 0.0;
    for group in &groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        rank_term += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }
    let h = 12.0 / (total * (total + 1.0)) * rank_term - 3.0 * (total + 1.0);

    let mut sorted = pooled.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut tie_sum = 0.0;
    let mut run = 1.0_f64;
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            run += 1.0;
        } else {
            tie_sum += run.powi(3) - run;
            run = 1.0;
        }
    }
    tie_sum += run.powi(3) - run;

    let correction = 1.0 - tie_sum / (total.powi(3) - total);
    if correction <= 0.0 {
        return Err(MathError::CalculationError(
            "All values are identical; the H statistic is undefined".to_string(),
        ));
    }
    let statistic = h / correction;

    let df = (groups.len() - 1) as f64;
    let chi2 = ChiSquared::new(df).map_err(|e| MathError::CalculationError(e.to_string()))?;
    let p_value = (1.0 - chi2.cdf(statistic.max(0.0))).clamp(0.0, 1.0);

    Ok(KruskalWallisResult {
        statistic,
        p_value,
        groups: groups.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_known_statistic() {
        // No ties: ranks are 1..=6, group sums 6 and 15
        let groups = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let result = kruskal_wallis(&groups).unwrap();
        let expected = 12.0 / 42.0 * (36.0 / 3.0 + 225.0 / 3.0) - 21.0;
        assert_relative_eq!(result.statistic, expected, epsilon = 1e-12);
        assert_eq!(result.groups, 2);
    }

    #[test]
    fn test_separated_groups_reject_equality() {
        let groups: Vec<Vec<f64>> = (0..4)
            .map(|g| (0..30).map(|i| g as f64 * 100.0 + (i % 5) as f64).collect())
            .collect();
        let result = kruskal_wallis(&groups).unwrap();
        assert!(result.rejects_equality(0.05));
    }

    #[test]
    fn test_identical_groups_keep_equality() {
        let base: Vec<f64> = (0..30).map(|i| (i % 7) as f64).collect();
        let groups = vec![base.clone(), base.clone(), base];
        let result = kruskal_wallis(&groups).unwrap();
        assert!(!result.rejects_equality(0.05));
    }

    #[test]
    fn test_needs_two_groups() {
        let groups = vec![vec![1.0, 2.0], vec![]];
        assert!(matches!(
            kruskal_wallis(&groups),
            Err(MathError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_constant_values_are_rejected() {
        let groups = vec![vec![3.0; 5], vec![3.0; 5]];
        assert!(matches!(
            kruskal_wallis(&groups),
            Err(MathError::CalculationError(_))
        ));
    }
}
