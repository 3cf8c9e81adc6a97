//! Statistical engine
//!
//! Normality and sphericity diagnostics plus the repeated-measures engine
//! (omnibus test, paired post-hoc test, multiplicity correction). The engine
//! sits behind [`RepeatedMeasuresEngine`] so the pipeline control flow does
//! not depend on which tests are used.

mod friedman;
mod holm;
mod mauchly;
mod shapiro;
mod wilcoxon;

pub use friedman::friedman;
pub use holm::holm;
pub use mauchly::{mauchly, SphericityOutcome};
pub use shapiro::shapiro_wilk;
pub use wilcoxon::wilcoxon_signed_rank;

use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

/// Statistic and p-value of one hypothesis test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

/// Swappable repeated-measures test engine
pub trait RepeatedMeasuresEngine: Send + Sync {
    /// Omnibus test over k related samples of equal length
    fn omnibus_test(&self, samples: &[Vec<f64>]) -> Result<TestOutcome, StatsError>;

    /// Paired two-sample test
    fn pairwise_test(&self, a: &[f64], b: &[f64]) -> Result<TestOutcome, StatsError>;

    /// Adjust a family of p-values, returned in input order
    fn correct(&self, p_values: &[f64]) -> Vec<f64>;

    fn omnibus_name(&self) -> &'static str;

    fn pairwise_name(&self) -> &'static str;

    fn correction_name(&self) -> &'static str;
}

/// Friedman omnibus, Wilcoxon signed-rank post-hoc, Holm correction
#[derive(Debug, Clone, Copy, Default)]
pub struct NonParametricEngine;

impl RepeatedMeasuresEngine for NonParametricEngine {
    fn omnibus_test(&self, samples: &[Vec<f64>]) -> Result<TestOutcome, StatsError> {
        friedman(samples)
    }

    fn pairwise_test(&self, a: &[f64], b: &[f64]) -> Result<TestOutcome, StatsError> {
        wilcoxon_signed_rank(a, b)
    }

    fn correct(&self, p_values: &[f64]) -> Vec<f64> {
        holm(p_values)
    }

    fn omnibus_name(&self) -> &'static str {
        "friedman"
    }

    fn pairwise_name(&self) -> &'static str {
        "wilcoxon"
    }

    fn correction_name(&self) -> &'static str {
        "holm"
    }
}

fn standard_normal() -> Result<Normal, StatsError> {
    Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))
}

/// Upper tail of the chi-square distribution
pub(crate) fn chi2_sf(statistic: f64, dof: f64) -> Result<f64, StatsError> {
    let dist = ChiSquared::new(dof).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok((1.0 - dist.cdf(statistic.max(0.0))).clamp(0.0, 1.0))
}

/// Average ranks (1-based) of `values`, plus the size of every tie group
pub(crate) fn average_ranks(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end share the mean of ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        if end - start > 1 {
            ties.push(end - start);
        }
        start = end;
    }

    (ranks, ties)
}

/// Σ(t³ − t) over tie group sizes
pub(crate) fn tie_sum(ties: &[usize]) -> f64 {
    ties.iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_average_ranks_with_ties() {
        let (ranks, ties) = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
        assert_eq!(ties, vec![2]);
        assert_eq!(tie_sum(&ties), 6.0);
    }

    #[test]
    fn test_average_ranks_without_ties() {
        let (ranks, ties) = average_ranks(&[3.0, 1.0, 2.0]);
        assert_eq!(ranks, vec![3.0, 1.0, 2.0]);
        assert!(ties.is_empty());
    }

    #[test]
    fn test_chi2_sf_two_dof_is_exponential() {
        let p = chi2_sf(8.0, 2.0).unwrap();
        assert!((p - (-4.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_engine_names() {
        let engine = NonParametricEngine;
        assert_eq!(engine.omnibus_name(), "friedman");
        assert_eq!(engine.pairwise_name(), "wilcoxon");
        assert_eq!(engine.correction_name(), "holm");
    }
}
